// ABOUTME: Decodes page bytes into a string before enhancement.
// ABOUTME: Uses an explicit label, then a meta charset declaration, then BOM or chardetng detection.

use std::path::Path;

use encoding_rs::Encoding;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::EnhanceError;
use crate::result::Result;

/// Bytes inspected for a `<meta>` charset declaration.
const META_SNIFF_LEN: usize = 1024;

static META_CHARSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta[^>]*?charset\s*=\s*["']?\s*([A-Za-z0-9_\-:.]+)"#).unwrap()
});

/// Decodes a page. `label` (an encoding label such as `latin1`) wins over
/// anything found in the bytes; an unknown label is a config error.
pub fn decode_document(bytes: &[u8], label: Option<&str>) -> Result<String> {
    if let Some(label) = label {
        let encoding = Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
            EnhanceError::config(label, "decode", Some(anyhow::anyhow!("unknown encoding label")))
        })?;
        return Ok(decode_with(encoding, bytes));
    }

    if let Some(encoding) = sniff_meta_charset(bytes) {
        return Ok(decode_with(encoding, bytes));
    }

    // Use chardetng for detection; decode() still honours a BOM
    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(bytes, true);
    let encoding = detector.guess(None, true);
    Ok(decode_with(encoding, bytes))
}

/// Reads and decodes a file.
pub fn read_document(path: &Path, label: Option<&str>) -> Result<String> {
    let bytes = std::fs::read(path)
        .map_err(|e| EnhanceError::io(path.display().to_string(), "read", Some(e.into())))?;
    decode_document(&bytes, label)
}

fn decode_with(encoding: &'static Encoding, bytes: &[u8]) -> String {
    let (decoded, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::debug!(encoding = used.name(), "input contained malformed sequences");
    }
    decoded.into_owned()
}

/// Encoding declared by a `<meta charset>` or `http-equiv` content type near
/// the start of the page.
fn sniff_meta_charset(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = &bytes[..bytes.len().min(META_SNIFF_LEN)];
    let head = String::from_utf8_lossy(head);
    let label = META_CHARSET.captures(&head)?.get(1)?.as_str();
    Encoding::for_label(label.as_bytes())
}
