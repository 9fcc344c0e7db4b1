//! Decoding of recorded reference images and live captures
use crate::errors::VisualError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, GenericImageView};

/// Decode a base64 image, tolerating a `data:image/...;base64,` prefix and
/// embedded whitespace.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>, VisualError> {
    let trimmed = payload.trim();
    let body = match trimmed.split_once(',') {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => trimmed,
    };
    let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(VisualError::EmptyInput);
    }
    Ok(STANDARD.decode(compact)?)
}

/// Encode raw image bytes as plain base64 (no data URL prefix).
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode PNG/JPEG bytes into an image with at least one pixel.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, VisualError> {
    if bytes.is_empty() {
        return Err(VisualError::EmptyInput);
    }
    let image = image::load_from_memory(bytes)?;
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(VisualError::ZeroSized { width, height });
    }
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_data_url_prefix() {
        let encoded = encode_base64(b"hello");
        let with_prefix = format!("data:image/png;base64,{}", encoded);
        assert_eq!(decode_base64(&with_prefix).unwrap(), b"hello");
        assert_eq!(decode_base64(&encoded).unwrap(), b"hello");
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert!(matches!(decode_base64("  "), Err(VisualError::EmptyInput)));
        assert!(matches!(
            decode_base64("not base64!!"),
            Err(VisualError::InvalidEncoding(_))
        ));
        assert!(decode_image(b"definitely not a png").is_err());
        assert!(matches!(decode_image(&[]), Err(VisualError::EmptyInput)));
    }
}
