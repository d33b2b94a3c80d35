//! Turning an uploaded data URI into a storable image.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::ImageReader;
use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;
use std::io::Cursor;

use crate::error::{Result, ServiceError};

/// Image formats accepted for upload, in preference order
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["png", "gif", "jpg", "jpeg"];

pub const SALT_LENGTH: usize = 16;

const SALT_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

lazy_static! {
    /// `data:<mime>;base64,<payload>`
    static ref DATA_URI_REGEX: Regex = Regex::new(
        r"^data:(?P<mime>[A-Za-z0-9.+-]+/[A-Za-z0-9.+-]+);base64,(?P<payload>.*)$"
    ).unwrap();
}

/// A decoded image ready to be uploaded
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub mime: String,
    pub extension: String,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Parse and validate a data URI image payload.
///
/// Fails with `UnsupportedFormat` when the declared type does not map to an
/// allow-listed extension, and with `InvalidImage` when the payload is not
/// valid base64 or not a decodable image.
pub fn decode_data_uri(data_uri: &str) -> Result<DecodedImage> {
    let caps = DATA_URI_REGEX
        .captures(data_uri.trim())
        .ok_or_else(|| ServiceError::InvalidImage("expected a base64 data URI".to_string()))?;

    let mime = caps["mime"].to_ascii_lowercase();
    let extension = extension_for_mime(&mime)?;

    let payload: String = caps["payload"].chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = BASE64
        .decode(payload.as_bytes())
        .map_err(|e| ServiceError::InvalidImage(format!("bad base64 payload: {}", e)))?;

    let (width, height) = ImageReader::new(Cursor::new(&bytes))
        .with_guessed_format()
        .map_err(|e| ServiceError::InvalidImage(e.to_string()))?
        .into_dimensions()
        .map_err(|e| ServiceError::InvalidImage(e.to_string()))?;

    Ok(DecodedImage {
        mime,
        extension,
        bytes,
        width,
        height,
    })
}

/// Map a MIME type to the first allow-listed extension it is known by
pub fn extension_for_mime(mime: &str) -> Result<String> {
    let known = mime_guess::get_mime_extensions_str(mime).unwrap_or(&[]);

    ALLOWED_EXTENSIONS
        .iter()
        .find(|ext| known.contains(*ext))
        .map(|ext| ext.to_string())
        .ok_or_else(|| {
            let shown = known.first().copied().unwrap_or(mime);
            ServiceError::UnsupportedFormat(shown.to_string())
        })
}

/// Random object-name salt: uppercase letters and digits, drawn uniformly
/// from the thread-local CSPRNG.
pub fn generate_salt() -> String {
    let mut rng = rand::rng();
    (0..SALT_LENGTH)
        .map(|_| SALT_ALPHABET[rng.random_range(0..SALT_ALPHABET.len())] as char)
        .collect()
}
