use log::{debug, info};
use sha2::{Digest, Sha256};

use crate::MrpError;

/// Text body of a remote resource together with its SHA-256 digest.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub body: String,
    pub digest: String,
}

/// Hex-encoded SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Performs a blocking GET and returns the body as text. Non-2xx responses
/// are errors.
pub fn fetch_text(url: &str) -> Result<Fetched, MrpError> {
    info!("fetching {url}");
    let http_error = |source: ureq::Error| MrpError::Http {
        url: url.to_string(),
        source,
    };
    let mut response = ureq::get(url).call().map_err(http_error)?;
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(http_error)?;
    let digest = sha256_hex(body.as_bytes());
    debug!("fetched {} bytes from {url}, sha256 {digest}", body.len());
    Ok(Fetched { body, digest })
}
