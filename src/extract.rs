use std::collections::HashSet;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::models::ExtractionResult;

// ── Constants ────────────────────────────────────────────────────────────────

pub const DEFAULT_IMAGE_DIR: &str = "extracted_images";

/// Upper bound on `/Parent` hops when looking up inherited page resources.
const MAX_TREE_DEPTH: usize = 64;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("Error processing PDF: {0}")]
    Processing(String),
    #[error(transparent)]
    Pdf(#[from] lopdf::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ── Public API ───────────────────────────────────────────────────────────────

/// Extract page-delimited text and the total image reference count.
///
/// Every page contributes `--- Page N ---\n{text}\n`; chunks are joined with a
/// newline. Images are counted per page, so one image object drawn on three
/// pages counts three times, while repeated references on a single page count
/// once. Images drawn through Form XObjects are included. Any failure is reported as
/// [`ExtractionError::Processing`] carrying the underlying message.
pub fn extract_text_and_images(path: &Path) -> Result<ExtractionResult, ExtractionError> {
    read_document(path).map_err(|e| ExtractionError::Processing(e.to_string()))
}

/// Write every image referenced by every page to `output_dir`.
///
/// Files are named `page_{n}_img_{m}.{ext}`; an image shared between pages is
/// written once per page. Errors from the PDF library or the filesystem are
/// returned as-is.
pub fn extract_images(path: &Path, output_dir: &Path) -> Result<Vec<PathBuf>, ExtractionError> {
    std::fs::create_dir_all(output_dir)?;

    let document = Document::load(path)?;
    let mut written = Vec::new();

    for (page_number, page_id) in document.get_pages() {
        for (index, image_id) in page_images(&document, page_id)?.into_iter().enumerate() {
            let (bytes, ext) = image_bytes(&document, image_id)?;
            let image_path =
                output_dir.join(format!("page_{}_img_{}.{}", page_number, index + 1, ext));
            std::fs::write(&image_path, bytes)?;
            written.push(image_path);
        }
    }

    tracing::debug!("wrote {} images to {}", written.len(), output_dir.display());
    Ok(written)
}

// ── Text and image counting ──────────────────────────────────────────────────

fn read_document(path: &Path) -> Result<ExtractionResult, ExtractionError> {
    let document = Document::load(path)?;
    let pages = document.get_pages();

    let mut chunks = Vec::with_capacity(pages.len());
    let mut images_count = 0usize;

    for (&page_number, &page_id) in pages.iter() {
        let text = document.extract_text(&[page_number])?;
        chunks.push(format!("--- Page {} ---\n{}\n", page_number, text));
        images_count += page_images(&document, page_id)?.len();
    }

    Ok(ExtractionResult {
        text: chunks.join("\n"),
        images_count,
        pages: pages.len(),
    })
}

/// Distinct image XObjects reachable from the page's resources.
///
/// Form XObjects are searched through their own resources, so an image drawn
/// only inside a form is still listed. Each image appears once per page, in
/// first-seen order.
fn page_images(document: &Document, page_id: ObjectId) -> Result<Vec<ObjectId>, lopdf::Error> {
    let resources = match page_resources(document, page_id)? {
        Some(r) => r,
        None => return Ok(Vec::new()),
    };

    let mut images = Vec::new();
    let mut seen = HashSet::new();
    collect_images(document, resources, &mut images, &mut seen)?;
    Ok(images)
}

/// `seen` holds every visited XObject id, forms included, which stops cycles.
fn collect_images(
    document: &Document,
    resources: &Dictionary,
    images: &mut Vec<ObjectId>,
    seen: &mut HashSet<ObjectId>,
) -> Result<(), lopdf::Error> {
    let xobjects = match resources.get(b"XObject") {
        Ok(obj) => resolve_dict(document, obj)?,
        Err(_) => return Ok(()),
    };

    for (_name, entry) in xobjects.iter() {
        let id = match entry {
            Object::Reference(id) => *id,
            _ => continue,
        };
        if !seen.insert(id) {
            continue;
        }
        let stream = match document.get_object(id) {
            Ok(Object::Stream(stream)) => stream,
            _ => continue,
        };
        match xobject_subtype(stream) {
            Some(b"Image") => images.push(id),
            Some(b"Form") => {
                if let Ok(form_resources) = stream.dict.get(b"Resources") {
                    let form_resources = resolve_dict(document, form_resources)?;
                    collect_images(document, form_resources, images, seen)?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Resources of a page, inherited from the nearest ancestor that defines them.
fn page_resources(
    document: &Document,
    page_id: ObjectId,
) -> Result<Option<&Dictionary>, lopdf::Error> {
    let mut node = document.get_dictionary(page_id)?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(resources) = node.get(b"Resources") {
            return resolve_dict(document, resources).map(Some);
        }
        match node.get(b"Parent") {
            Ok(Object::Reference(parent)) => node = document.get_dictionary(*parent)?,
            _ => return Ok(None),
        }
    }
    Ok(None)
}

fn resolve_dict<'a>(
    document: &'a Document,
    obj: &'a Object,
) -> Result<&'a Dictionary, lopdf::Error> {
    match obj {
        Object::Reference(id) => document.get_dictionary(*id),
        other => other.as_dict(),
    }
}

fn xobject_subtype(stream: &Stream) -> Option<&[u8]> {
    match stream.dict.get(b"Subtype") {
        Ok(Object::Name(name)) => Some(name.as_slice()),
        _ => None,
    }
}

// ── Image export ─────────────────────────────────────────────────────────────

fn image_bytes(
    document: &Document,
    id: ObjectId,
) -> Result<(Vec<u8>, &'static str), lopdf::Error> {
    let stream = document.get_object(id)?.as_stream()?;
    let filters = stream_filters(stream);

    let exported = match filters.as_slice() {
        [] => encode_samples(stream, stream.content.clone()),
        [f] if f == b"DCTDecode" => (stream.content.clone(), "jpeg"),
        [f] if f == b"JPXDecode" => (stream.content.clone(), "jpx"),
        [f] if f == b"JBIG2Decode" => (stream.content.clone(), "jb2"),
        [f] if f == b"FlateDecode" || f == b"LZWDecode" => {
            encode_samples(stream, stream.decompressed_content()?)
        }
        _ => (stream.content.clone(), "bin"),
    };
    Ok(exported)
}

fn stream_filters(stream: &Stream) -> Vec<Vec<u8>> {
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Object::Name(name) => Some(name.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Re-encode raw 8-bit RGB or gray samples as PNG; anything else stays raw.
fn encode_samples(stream: &Stream, samples: Vec<u8>) -> (Vec<u8>, &'static str) {
    let color_space = match stream.dict.get(b"ColorSpace") {
        Ok(Object::Name(name)) => Some(name.as_slice()),
        _ => None,
    };

    let dims = (
        dict_u32(&stream.dict, b"Width"),
        dict_u32(&stream.dict, b"Height"),
        dict_u32(&stream.dict, b"BitsPerComponent"),
    );
    let (width, height) = match dims {
        (Some(w), Some(h), Some(8)) => (w, h),
        _ => return (samples, "bin"),
    };

    let image = match color_space {
        Some(b"DeviceRGB") => {
            RgbImage::from_raw(width, height, samples.clone()).map(DynamicImage::ImageRgb8)
        }
        Some(b"DeviceGray") => {
            GrayImage::from_raw(width, height, samples.clone()).map(DynamicImage::ImageLuma8)
        }
        _ => None,
    };

    let Some(image) = image else {
        return (samples, "bin");
    };

    let mut png = Vec::new();
    match image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png) {
        Ok(()) => (png, "png"),
        Err(e) => {
            tracing::warn!("PNG encoding failed, keeping raw samples: {}", e);
            (samples, "bin")
        }
    }
}

fn dict_u32(dict: &Dictionary, key: &[u8]) -> Option<u32> {
    dict.get(key)
        .and_then(|o| o.as_i64())
        .ok()
        .and_then(|v| u32::try_from(v).ok())
}
