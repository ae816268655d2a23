//! Text-to-repaired-bytes scenarios across modules.

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};

use super::*;

fn fingerprint_png(width: u32, height: u32) -> Vec<u8> {
    let ridges = GrayImage::from_fn(width, height, |x, y| {
        Luma([if (x + y) % 4 < 2 { 30 } else { 220 }])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(ridges)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

fn data_url(bytes: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(bytes))
}

#[test]
fn data_url_template_repairs_directly() {
    let png = fingerprint_png(32, 40);
    let raw = decode_template(&data_url(&png)).unwrap();
    assert_eq!(raw, png);
    assert_eq!(png_dimensions(&raw), Some((32, 40)));

    let repaired = RepairPipeline::new().repair(&raw).unwrap();
    assert_eq!(repaired.strategy, Strategy::Direct);
}

#[test]
fn wrapped_unpadded_template_decodes() {
    let png = fingerprint_png(10, 10);
    let encoded = STANDARD.encode(&png);
    // Upstream stores sometimes wrap lines and lose the padding.
    let mangled: String = encoded
        .trim_end_matches('=')
        .as_bytes()
        .chunks(60)
        .map(|c| std::str::from_utf8(c).unwrap())
        .collect::<Vec<_>>()
        .join("\r\n");
    assert_eq!(decode_template(&mangled).unwrap(), png);
    assert!(!detect_corruption(&mangled));
}

#[test]
fn repaired_bytes_keep_dimensions() {
    let mut png = fingerprint_png(25, 17);
    png[31] ^= 0x01;
    let input = png.clone();

    let repaired = RepairPipeline::new().repair(&png).unwrap();
    assert_ne!(repaired.strategy, Strategy::Direct);
    assert_eq!(png, input, "input buffer must not be mutated");

    let img = image::load_from_memory(&repaired.bytes).unwrap();
    assert_eq!((img.width(), img.height()), (25, 17));
    assert_eq!(png_dimensions(&repaired.bytes), Some((25, 17)));
}

#[test]
fn jpeg_template_is_corrupt_and_rejected() {
    let jpeg = b"\xff\xd8\xff\xe0\x00\x10JFIF\x00\x01";
    let text = STANDARD.encode(jpeg);
    assert!(detect_corruption(&text));

    let raw = decode_template(&text).unwrap();
    assert!(matches!(
        RepairPipeline::new().repair(&raw),
        Err(RepairError::BadSignature)
    ));
}

#[test]
fn blank_template_is_corrupt_but_empty() {
    let blank = "data:image/png;base64,";
    assert!(detect_corruption(blank));
    assert!(matches!(decode_template(blank), Err(TemplateError::Empty)));

    let truncated = STANDARD.encode(&PNG_SIGNATURE[..6]);
    assert!(detect_corruption(&truncated));
    assert!(!detect_corruption(&data_url(&fingerprint_png(2, 2))));
}
