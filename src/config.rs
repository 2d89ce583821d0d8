use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::ai::{API_KEY_ENV, DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS};

pub const DEFAULT_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
pub const DEFAULT_MAX_UPLOAD_MB: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} is not a valid {kind}: {value}")]
    Invalid {
        name: &'static str,
        kind: &'static str,
        value: String,
    },
    #[error("{0} must be an http or https URL")]
    Scheme(&'static str),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub api_key: Option<String>,
    pub model: String,
    pub gemini_base_url: Url,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let addr_raw = get("PDF_VOX_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr_raw.parse().map_err(|_| ConfigError::Invalid {
            name: "PDF_VOX_ADDR",
            kind: "socket address",
            value: addr_raw.clone(),
        })?;

        let max_upload_bytes = match get("PDF_VOX_MAX_UPLOAD_MB") {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .and_then(|mb| mb.checked_mul(1024 * 1024))
                .ok_or(ConfigError::Invalid {
                    name: "PDF_VOX_MAX_UPLOAD_MB",
                    kind: "size in megabytes",
                    value: raw,
                })?,
            None => DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
        };

        let timeout_secs = match get("GEMINI_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|_| ConfigError::Invalid {
                name: "GEMINI_TIMEOUT_SECS",
                kind: "number",
                value: raw,
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let base_raw = get("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let gemini_base_url = Url::parse(&base_raw).map_err(|_| ConfigError::Invalid {
            name: "GEMINI_BASE_URL",
            kind: "URL",
            value: base_raw.clone(),
        })?;
        if !matches!(gemini_base_url.scheme(), "http" | "https") {
            return Err(ConfigError::Scheme("GEMINI_BASE_URL"));
        }

        Ok(Self {
            addr,
            upload_dir: PathBuf::from(
                get("PDF_VOX_UPLOAD_DIR").unwrap_or_else(|| DEFAULT_UPLOAD_DIR.to_string()),
            ),
            max_upload_bytes,
            api_key: get(API_KEY_ENV),
            model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            gemini_base_url,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}
