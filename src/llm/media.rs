use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::InputError;
use crate::models::{ImagePayload, ReferenceImage};

static DATA_URI_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^data:image/(png|jpeg|jpg|webp);base64,").expect("static regex is valid")
});

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    if data.len() > 12 {
        let ftyp = &data[4..12];
        if ftyp.starts_with(b"ftyp") {
            let brand = &ftyp[4..8];
            if brand == b"heic" || brand == b"heif" || brand == b"hevc" {
                return Some("image/heic".to_string());
            }
        }
    }

    infer::get(data).map(|kind| kind.mime_type().to_string())
}

/// Strips a `data:image/...;base64,` prefix, leaving bare base64 data.
pub fn clean_base64(data: &str) -> &str {
    match DATA_URI_PREFIX.find(data) {
        Some(prefix) => &data[prefix.end()..],
        None => data,
    }
}

pub fn normalize_image_mime_type(mime_type: &str) -> String {
    let lowered = mime_type.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "image/jpg" => "image/jpeg".to_string(),
        _ => lowered,
    }
}

/// Accepts raw file bytes only when they sniff as an image.
pub fn image_from_bytes(bytes: &[u8]) -> Result<ReferenceImage, InputError> {
    let mime_type = detect_mime_type(bytes).unwrap_or_else(|| "application/octet-stream".to_string());
    if !mime_type.starts_with("image/") {
        return Err(InputError::NotAnImage(mime_type));
    }
    let mime_type = normalize_image_mime_type(&mime_type);
    debug!(mime_type = %mime_type, bytes = bytes.len(), "Accepted reference image");
    Ok(ReferenceImage::new(ImagePayload::from_bytes(bytes, &mime_type)))
}

pub async fn read_image_file(path: &Path) -> Result<ReferenceImage, InputError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| InputError::Io {
        path: path.display().to_string(),
        source,
    })?;
    image_from_bytes(&bytes)
}
