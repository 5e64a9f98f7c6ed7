use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// An uploaded reference image, kept in its encoded form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    pub data: String,
    pub mime_type: String,
}

impl ReferenceImage {
    pub fn from_base64(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self::from_base64(BASE64.encode(bytes), mime_type)
    }

    pub fn data_uri(&self) -> String {
        data_uri(&self.mime_type, &self.data)
    }
}

pub fn data_uri(mime_type: &str, base64_payload: &str) -> String {
    format!("data:{mime_type};base64,{base64_payload}")
}

/// Reads a file into a [`ReferenceImage`]. Size and format are not checked;
/// the MIME type comes from the extension and falls back to PNG.
pub fn read_reference_image(path: &Path) -> Result<ReferenceImage> {
    let bytes = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
    let mime = mime_for_path(path).unwrap_or("image/png");
    Ok(ReferenceImage::from_bytes(&bytes, mime))
}

/// Splits a `data:<mime>;base64,<payload>` handle into its MIME type and bytes.
pub fn decode_data_uri(handle: &str) -> Result<(String, Vec<u8>)> {
    let Some(rest) = handle.trim().strip_prefix("data:") else {
        bail!("not a data URI");
    };
    let Some((header, payload)) = rest.split_once(',') else {
        bail!("data URI has no payload separator");
    };
    let Some(mime) = header.strip_suffix(";base64") else {
        bail!("data URI is not base64 encoded");
    };
    let bytes = BASE64
        .decode(payload.trim().as_bytes())
        .context("data URI payload base64 decode failed")?;
    Ok((mime.to_string(), bytes))
}

pub fn download_file_name(stamp_millis: u128) -> String {
    format!("Joey_{stamp_millis}.png")
}

/// Writes an image handle into `dir` as `Joey_<millis>.png`.
pub fn save_image_handle(handle: &str, dir: &Path) -> Result<PathBuf> {
    let (_, bytes) = decode_data_uri(handle)?;
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(download_file_name(timestamp_millis()));
    fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

pub(crate) fn timestamp_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis())
        .unwrap_or(0)
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}
