//! In-memory PDF fixtures built with lopdf.

#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

pub struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    font_id: ObjectId,
    kids: Vec<Object>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        Self {
            doc,
            pages_id,
            font_id,
            kids: Vec::new(),
        }
    }

    /// 2x2 uncompressed RGB image.
    pub fn rgb_image(&mut self) -> ObjectId {
        let dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 2,
            "Height" => 2,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        };
        self.doc.add_object(Stream::new(dict, vec![200u8; 12]))
    }

    /// Image stream tagged as JPEG; bytes are copied through untouched.
    pub fn jpeg_image(&mut self, bytes: &[u8]) -> ObjectId {
        let dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 1,
            "Height" => 1,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        };
        let stream = Stream::new(dict, bytes.to_vec());
        self.doc.add_object(stream)
    }

    pub fn form_xobject(&mut self) -> ObjectId {
        let bbox: Vec<Object> = vec![0.into(), 0.into(), 10.into(), 10.into()];
        let dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => bbox,
        };
        self.doc.add_object(Stream::new(dict, Vec::new()))
    }

    /// Form XObject that draws each of `xobjects` from its own resources.
    pub fn form_wrapping(&mut self, xobjects: &[ObjectId]) -> ObjectId {
        let id = self.doc.new_object_id();
        self.insert_form(id, xobjects);
        id
    }

    /// Form XObject whose resources name the form itself alongside `xobjects`.
    pub fn self_referencing_form(&mut self, xobjects: &[ObjectId]) -> ObjectId {
        let id = self.doc.new_object_id();
        let mut names = vec![id];
        names.extend_from_slice(xobjects);
        self.insert_form(id, &names);
        id
    }

    fn insert_form(&mut self, id: ObjectId, xobjects: &[ObjectId]) {
        let mut xobject_dict = Dictionary::new();
        let mut operations = Vec::new();
        for (i, xobject) in xobjects.iter().enumerate() {
            let name = format!("Im{}", i + 1);
            operations.push(Operation::new("Do", vec![Object::Name(name.clone().into_bytes())]));
            xobject_dict.set(name, *xobject);
        }
        let bbox: Vec<Object> = vec![0.into(), 0.into(), 10.into(), 10.into()];
        let dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => bbox,
            "Resources" => dictionary! { "XObject" => xobject_dict },
        };
        let encoded = Content { operations }.encode().expect("encode form content");
        self.doc
            .objects
            .insert(id, Object::Stream(Stream::new(dict, encoded)));
    }

    /// Page whose resources list every `(name, id)` pair verbatim.
    pub fn page_with_names(&mut self, text: &str, xobjects: &[(&str, ObjectId)]) -> &mut Self {
        let mut xobject_dict = Dictionary::new();
        for (name, id) in xobjects {
            xobject_dict.set(*name, *id);
        }
        self.push_page(text, xobject_dict)
    }

    /// A page with its own resources: the shared font plus `xobjects`.
    pub fn page(&mut self, text: &str, xobjects: &[ObjectId]) -> &mut Self {
        let mut xobject_dict = Dictionary::new();
        for (i, id) in xobjects.iter().enumerate() {
            xobject_dict.set(format!("X{}", i + 1), *id);
        }
        self.push_page(text, xobject_dict)
    }

    fn push_page(&mut self, text: &str, xobject_dict: Dictionary) -> &mut Self {
        let resources_id = self.doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => self.font_id },
            "XObject" => xobject_dict,
        });
        let content_id = self.content(text_operations(text));
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => media_box(),
        });
        self.kids.push(page_id.into());
        self
    }

    /// A page with no text and no resources of its own.
    pub fn bare_page(&mut self) -> &mut Self {
        let content_id = self.content(Vec::new());
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "Contents" => content_id,
            "MediaBox" => media_box(),
        });
        self.kids.push(page_id.into());
        self
    }

    pub fn build(&mut self) -> Vec<u8> {
        self.build_with_inherited(&[])
    }

    /// Finish the document, placing `xobjects` in the page tree root's
    /// resources so pages without their own inherit them.
    pub fn build_with_inherited(&mut self, xobjects: &[ObjectId]) -> Vec<u8> {
        let mut pages = dictionary! {
            "Type" => "Pages",
            "Kids" => self.kids.clone(),
            "Count" => self.kids.len() as i64,
        };
        if !xobjects.is_empty() {
            let mut xobject_dict = Dictionary::new();
            for (i, id) in xobjects.iter().enumerate() {
                xobject_dict.set(format!("Shared{}", i + 1), *id);
            }
            pages.set("Resources", dictionary! { "XObject" => xobject_dict });
        }
        self.doc.objects.insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        self.doc.save_to(&mut bytes).expect("serialize fixture pdf");
        bytes
    }

    fn content(&mut self, operations: Vec<Operation>) -> ObjectId {
        let encoded = Content { operations }.encode().expect("encode content");
        self.doc.add_object(Stream::new(dictionary! {}, encoded))
    }
}

fn text_operations(text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 24.into()]),
        Operation::new("Td", vec![72.into(), 720.into()]),
        Operation::new("Tj", vec![Object::string_literal(text)]),
        Operation::new("ET", vec![]),
    ]
}

fn media_box() -> Vec<Object> {
    vec![0.into(), 0.into(), 595.into(), 842.into()]
}

/// Two pages: "First page" with one image, "Second page" with none.
pub fn two_page_pdf_with_one_image() -> Vec<u8> {
    let mut builder = PdfBuilder::new();
    let image = builder.rgb_image();
    builder
        .page("First page", &[image])
        .page("Second page", &[]);
    builder.build()
}

pub fn write_fixture(dir: &std::path::Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("write fixture");
    path
}
