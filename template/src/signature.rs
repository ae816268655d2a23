use crate::decode::decode_template;

/// The literal 8-byte PNG magic every template must start with.
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Returns true if `bytes` starts with [`PNG_SIGNATURE`].
pub fn has_png_signature(bytes: &[u8]) -> bool {
    bytes.starts_with(&PNG_SIGNATURE)
}

/// Reads width and height from the IHDR chunk without decoding pixels.
///
/// Returns `None` unless the signature is present and the first chunk is a
/// complete IHDR header. The values are not validated against the CRC, so a
/// template with a damaged checksum still reports its declared size.
pub fn png_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    if !has_png_signature(bytes) || bytes.len() < 24 || &bytes[12..16] != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes(bytes[16..20].try_into().ok()?);
    let height = u32::from_be_bytes(bytes[20..24].try_into().ok()?);
    Some((width, height))
}

/// Reports whether template text is unusable before any decode attempt.
///
/// A template is considered corrupted when its base64 cannot be decoded,
/// the payload is shorter than the PNG signature, or the signature differs.
pub fn detect_corruption(template: &str) -> bool {
    match decode_template(template) {
        Ok(bytes) => !has_png_signature(&bytes),
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_prefix_only() {
        assert!(has_png_signature(&PNG_SIGNATURE));
        assert!(!has_png_signature(&PNG_SIGNATURE[..7]));
        assert!(!has_png_signature(b"\xff\xd8\xff\xe0JFIF"));
    }

    #[test]
    fn dimensions_from_header() {
        let mut bytes = PNG_SIGNATURE.to_vec();
        bytes.extend_from_slice(&13u32.to_be_bytes());
        bytes.extend_from_slice(b"IHDR");
        bytes.extend_from_slice(&300u32.to_be_bytes());
        bytes.extend_from_slice(&400u32.to_be_bytes());
        assert_eq!(png_dimensions(&bytes), Some((300, 400)));

        bytes[12..16].copy_from_slice(b"PLTE");
        assert_eq!(png_dimensions(&bytes), None);
    }

    #[test]
    fn corruption_verdicts() {
        // "iVBORw0KGgo=" is the PNG signature in base64.
        assert!(!detect_corruption("iVBORw0KGgo="));
        assert!(!detect_corruption("data:image/png;base64,iVBORw0KGgo="));
        assert!(detect_corruption("/9j/4AAQSkZJRg=="));
        assert!(detect_corruption("iVBO"));
        assert!(detect_corruption(""));
    }
}
