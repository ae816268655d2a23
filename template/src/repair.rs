//! Strategy chain that turns damaged PNG bytes into decodable PNG bytes.
//!
//! Every strategy is a plain function `&[u8] -> Result<Vec<u8>, RepairError>`
//! and never touches its input. [`RepairPipeline::repair`] runs them in order
//! and returns the first success.

use std::fmt;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use image::{
    DynamicImage, ImageBuffer, ImageFormat, ImageReader, Luma, LumaA, Rgb, Rgba,
};
use png::{BitDepth, ColorType, Transformations};

use crate::error::RepairError;
use crate::signature::has_png_signature;

/// One repair attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// The standard decoder accepts the bytes; they are returned unchanged.
    Direct,
    /// Decode ignoring CRC and Adler-32 checksums, re-encode as RGB PNG.
    Tolerant,
    /// Decode from a temporary file with decoder limits lifted.
    FileRoundTrip,
    /// Try every [`DecodeFlags`] combination.
    FlagSweep,
}

impl Strategy {
    /// Default order: cheapest and least lossy first.
    pub const ALL: [Strategy; 4] = [
        Strategy::Direct,
        Strategy::Tolerant,
        Strategy::FileRoundTrip,
        Strategy::FlagSweep,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Tolerant => "tolerant",
            Self::FileRoundTrip => "file_round_trip",
            Self::FlagSweep => "flag_sweep",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoder configurations tried by [`Strategy::FlagSweep`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeFlags {
    /// Format-sniffing decode, image kept as stored.
    Unchanged,
    /// Checksum-tolerant PNG decode keeping 16-bit depth and any color type.
    AnyDepthAnyColor,
    /// Checksum-tolerant decode reduced to 8-bit luma.
    Grayscale,
    /// Checksum-tolerant decode reduced to 8-bit RGB.
    Color,
    /// Explicit PNG decode with decoder limits lifted. `image` never applies
    /// orientation on decode, so this only differs from `Unchanged` in limits.
    IgnoreOrientation,
}

impl DecodeFlags {
    pub const ALL: [DecodeFlags; 5] = [
        DecodeFlags::Unchanged,
        DecodeFlags::AnyDepthAnyColor,
        DecodeFlags::Grayscale,
        DecodeFlags::Color,
        DecodeFlags::IgnoreOrientation,
    ];
}

/// Output of a successful repair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repaired {
    /// Decodable PNG bytes. Identical to the input for [`Strategy::Direct`].
    pub bytes: Vec<u8>,
    /// The strategy that produced `bytes`.
    pub strategy: Strategy,
}

/// Ordered chain of repair strategies.
///
/// Thread-safe: holds no mutable state, one pipeline can serve every request.
#[derive(Debug, Clone)]
pub struct RepairPipeline {
    strategies: Vec<Strategy>,
    temp_dir: Option<PathBuf>,
}

impl RepairPipeline {
    /// Creates a pipeline running [`Strategy::ALL`] with temp files in the
    /// system temp directory.
    pub fn new() -> Self {
        Self::with_strategies(&Strategy::ALL)
    }

    /// Creates a pipeline running only `strategies`, in the given order.
    pub fn with_strategies(strategies: &[Strategy]) -> Self {
        Self {
            strategies: strategies.to_vec(),
            temp_dir: None,
        }
    }

    /// Places file round-trip temp files under `dir`.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    /// Validates the PNG signature, then tries each strategy in order.
    ///
    /// Fails fast with [`RepairError::BadSignature`] before any decode, and
    /// with [`RepairError::Exhausted`] when no strategy succeeds.
    pub fn repair(&self, bytes: &[u8]) -> Result<Repaired, RepairError> {
        if !has_png_signature(bytes) {
            return Err(RepairError::BadSignature);
        }

        let mut attempts = 0;
        self.strategies
            .iter()
            .find_map(|&strategy| {
                attempts += 1;
                match self.run(strategy, bytes) {
                    Ok(out) => {
                        if strategy != Strategy::Direct {
                            tracing::info!(%strategy, before = bytes.len(), after = out.len(), "repair: template repaired");
                        }
                        Some(Repaired {
                            bytes: out,
                            strategy,
                        })
                    }
                    Err(e) => {
                        tracing::debug!(%strategy, error = %e, "repair: strategy failed");
                        None
                    }
                }
            })
            .ok_or_else(|| RepairError::Exhausted { attempts })
    }

    fn run(&self, strategy: Strategy, bytes: &[u8]) -> Result<Vec<u8>, RepairError> {
        match strategy {
            Strategy::Direct => direct(bytes),
            Strategy::Tolerant => tolerant(bytes),
            Strategy::FileRoundTrip => file_round_trip(bytes, self.temp_dir.as_deref()),
            Strategy::FlagSweep => flag_sweep(bytes),
        }
    }
}

impl Default for RepairPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the input unchanged if the standard PNG decoder accepts it.
pub fn direct(bytes: &[u8]) -> Result<Vec<u8>, RepairError> {
    image::load_from_memory_with_format(bytes, ImageFormat::Png)
        .map(|_| bytes.to_vec())
        .map_err(|e| failed(Strategy::Direct, e))
}

/// Decodes with checksum verification off, normalizes to 8-bit RGB and
/// re-encodes as PNG.
pub fn tolerant(bytes: &[u8]) -> Result<Vec<u8>, RepairError> {
    let img = decode_png_tolerant(bytes, Transformations::normalize_to_color8())
        .map_err(|reason| failed(Strategy::Tolerant, reason))?;
    encode_rgb_png(&img).map_err(|e| failed(Strategy::Tolerant, e))
}

/// Writes the bytes to a temp file and decodes from the path.
///
/// The temp file is removed when this function returns.
pub fn file_round_trip(bytes: &[u8], dir: Option<&Path>) -> Result<Vec<u8>, RepairError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("fpid-repair-").suffix(".png");
    let mut file = match dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };
    file.write_all(bytes)?;
    file.flush()?;

    let mut reader = ImageReader::open(file.path())?.with_guessed_format()?;
    reader.no_limits();
    let img = reader
        .decode()
        .map_err(|e| failed(Strategy::FileRoundTrip, e))?;
    encode_rgb_png(&img).map_err(|e| failed(Strategy::FileRoundTrip, e))
}

/// Tries every [`DecodeFlags`] combination; the first decoded image is
/// normalized to 3-channel RGB and re-encoded as PNG.
pub fn flag_sweep(bytes: &[u8]) -> Result<Vec<u8>, RepairError> {
    for flags in DecodeFlags::ALL {
        match decode_with_flags(bytes, flags) {
            Ok(img) => {
                tracing::debug!(?flags, width = img.width(), height = img.height(), "repair: flag sweep decoded");
                return encode_rgb_png(&img).map_err(|e| failed(Strategy::FlagSweep, e));
            }
            Err(reason) => tracing::trace!(?flags, %reason, "repair: decode flags rejected"),
        }
    }
    Err(failed(Strategy::FlagSweep, "no decode flag combination succeeded"))
}

/// Decodes `bytes` with one flag combination.
pub fn decode_with_flags(bytes: &[u8], flags: DecodeFlags) -> Result<DynamicImage, String> {
    match flags {
        DecodeFlags::Unchanged => image::load_from_memory(bytes).map_err(|e| e.to_string()),
        DecodeFlags::AnyDepthAnyColor => decode_png_tolerant(bytes, Transformations::EXPAND),
        DecodeFlags::Grayscale => {
            decode_png_tolerant(bytes, Transformations::normalize_to_color8())
                .map(|img| DynamicImage::ImageLuma8(img.to_luma8()))
        }
        DecodeFlags::Color => decode_png_tolerant(bytes, Transformations::normalize_to_color8())
            .map(|img| DynamicImage::ImageRgb8(img.to_rgb8())),
        DecodeFlags::IgnoreOrientation => {
            let mut reader = ImageReader::with_format(Cursor::new(bytes), ImageFormat::Png);
            reader.no_limits();
            reader.decode().map_err(|e| e.to_string())
        }
    }
}

fn failed(strategy: Strategy, reason: impl fmt::Display) -> RepairError {
    RepairError::Strategy {
        strategy,
        reason: reason.to_string(),
    }
}

/// Decodes the first PNG frame with CRC and Adler-32 checks disabled.
fn decode_png_tolerant(bytes: &[u8], transformations: Transformations) -> Result<DynamicImage, String> {
    let mut decoder = png::Decoder::new(Cursor::new(bytes));
    decoder.ignore_checksums(true);
    decoder.set_transformations(transformations);
    let mut reader = decoder.read_info().map_err(|e| e.to_string())?;
    let mut buf = vec![0; reader.output_buffer_size()];
    let frame = reader.next_frame(&mut buf).map_err(|e| e.to_string())?;
    buf.truncate(frame.buffer_size());
    raw_to_image(frame.width, frame.height, frame.color_type, frame.bit_depth, buf)
}

/// Wraps a packed PNG output buffer in the matching [`DynamicImage`] variant.
fn raw_to_image(
    width: u32,
    height: u32,
    color: ColorType,
    depth: BitDepth,
    buf: Vec<u8>,
) -> Result<DynamicImage, String> {
    let short = || format!("pixel buffer too short for {width}x{height} {color:?}/{depth:?}");
    let img = match (color, depth) {
        (ColorType::Grayscale, BitDepth::Eight) => {
            DynamicImage::ImageLuma8(ImageBuffer::<Luma<u8>, _>::from_raw(width, height, buf).ok_or_else(short)?)
        }
        (ColorType::GrayscaleAlpha, BitDepth::Eight) => {
            DynamicImage::ImageLumaA8(ImageBuffer::<LumaA<u8>, _>::from_raw(width, height, buf).ok_or_else(short)?)
        }
        (ColorType::Rgb, BitDepth::Eight) => {
            DynamicImage::ImageRgb8(ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buf).ok_or_else(short)?)
        }
        (ColorType::Rgba, BitDepth::Eight) => {
            DynamicImage::ImageRgba8(ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, buf).ok_or_else(short)?)
        }
        (ColorType::Grayscale, BitDepth::Sixteen) => DynamicImage::ImageLuma16(
            ImageBuffer::<Luma<u16>, _>::from_raw(width, height, be_u16(&buf)).ok_or_else(short)?,
        ),
        (ColorType::GrayscaleAlpha, BitDepth::Sixteen) => DynamicImage::ImageLumaA16(
            ImageBuffer::<LumaA<u16>, _>::from_raw(width, height, be_u16(&buf)).ok_or_else(short)?,
        ),
        (ColorType::Rgb, BitDepth::Sixteen) => DynamicImage::ImageRgb16(
            ImageBuffer::<Rgb<u16>, _>::from_raw(width, height, be_u16(&buf)).ok_or_else(short)?,
        ),
        (ColorType::Rgba, BitDepth::Sixteen) => DynamicImage::ImageRgba16(
            ImageBuffer::<Rgba<u16>, _>::from_raw(width, height, be_u16(&buf)).ok_or_else(short)?,
        ),
        (color, depth) => return Err(format!("unsupported pixel layout {color:?}/{depth:?}")),
    };
    Ok(img)
}

// PNG stores 16-bit samples big-endian.
fn be_u16(buf: &[u8]) -> Vec<u16> {
    buf.chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect()
}

/// Converts to 8-bit RGB (gray expanded, alpha dropped) and encodes as PNG.
fn encode_rgb_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut out = Cursor::new(Vec::new());
    img.to_rgb8().write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ColorType as ImageColor, GrayAlphaImage, RgbImage};

    fn encode(img: &DynamicImage) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn sample_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x * 7) as u8, (y * 11) as u8, 128]));
        encode(&DynamicImage::ImageRgb8(img))
    }

    // Flips a bit in the IHDR CRC (bytes 29..33).
    fn break_ihdr_crc(mut bytes: Vec<u8>) -> Vec<u8> {
        bytes[30] ^= 0xFF;
        bytes
    }

    #[test]
    fn direct_returns_input_unchanged() {
        let png = sample_png(16, 9);
        assert_eq!(direct(&png).unwrap(), png);
    }

    #[test]
    fn direct_rejects_bad_crc() {
        let png = break_ihdr_crc(sample_png(16, 9));
        assert!(matches!(
            direct(&png),
            Err(RepairError::Strategy { strategy: Strategy::Direct, .. })
        ));
    }

    #[test]
    fn tolerant_recovers_bad_crc() {
        let png = break_ihdr_crc(sample_png(16, 9));
        let out = tolerant(&png).unwrap();
        let img = image::load_from_memory(&out).unwrap();
        assert_eq!((img.width(), img.height()), (16, 9));
        assert_eq!(img.color(), ImageColor::Rgb8);
    }

    #[test]
    fn tolerant_drops_alpha() {
        let gray = GrayAlphaImage::from_fn(5, 4, |x, _| LumaA([(x * 40) as u8, 200]));
        let png = break_ihdr_crc(encode(&DynamicImage::ImageLumaA8(gray)));
        let img = image::load_from_memory(&tolerant(&png).unwrap()).unwrap();
        assert_eq!(img.color(), ImageColor::Rgb8);
        assert_eq!(img.to_rgb8().get_pixel(2, 0), &Rgb([80, 80, 80]));
    }

    #[test]
    fn file_round_trip_in_dir() {
        let dir = tempfile::tempdir().unwrap();
        let png = sample_png(8, 8);
        let out = file_round_trip(&png, Some(dir.path())).unwrap();
        let img = image::load_from_memory(&out).unwrap();
        assert_eq!((img.width(), img.height()), (8, 8));
        // Temp file is cleaned up.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn flag_sweep_keeps_sixteen_bit_input() {
        let wide = ImageBuffer::<Luma<u16>, _>::from_fn(6, 3, |x, _| Luma([x as u16 * 10_000]));
        let png = break_ihdr_crc(encode(&DynamicImage::ImageLuma16(wide)));
        let img = decode_with_flags(&png, DecodeFlags::AnyDepthAnyColor).unwrap();
        assert_eq!(img.color(), ImageColor::L16);

        let out = flag_sweep(&png).unwrap();
        let img = image::load_from_memory(&out).unwrap();
        assert_eq!(img.color(), ImageColor::Rgb8);
        assert_eq!((img.width(), img.height()), (6, 3));
    }

    #[test]
    fn grayscale_flag_yields_luma() {
        let img = decode_with_flags(&sample_png(4, 4), DecodeFlags::Grayscale).unwrap();
        assert_eq!(img.color(), ImageColor::L8);
    }

    #[test]
    fn ignore_orientation_matches_plain_decode() {
        let png = sample_png(7, 5);
        let plain = decode_with_flags(&png, DecodeFlags::Unchanged).unwrap();
        let lifted = decode_with_flags(&png, DecodeFlags::IgnoreOrientation).unwrap();
        assert_eq!(plain, lifted);
        // Checksums are still enforced; only limits are lifted.
        assert!(decode_with_flags(&break_ihdr_crc(png), DecodeFlags::IgnoreOrientation).is_err());
    }

    #[test]
    fn pipeline_happy_path_is_direct() {
        let png = sample_png(20, 30);
        let repaired = RepairPipeline::new().repair(&png).unwrap();
        assert_eq!(repaired.strategy, Strategy::Direct);
        assert_eq!(repaired.bytes, png);
    }

    #[test]
    fn pipeline_falls_through_to_tolerant() {
        let png = break_ihdr_crc(sample_png(20, 30));
        let repaired = RepairPipeline::new().repair(&png).unwrap();
        assert_eq!(repaired.strategy, Strategy::Tolerant);
        let img = image::load_from_memory(&repaired.bytes).unwrap();
        assert_eq!((img.width(), img.height()), (20, 30));
    }

    #[test]
    fn pipeline_respects_strategy_order() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = RepairPipeline::with_strategies(&[Strategy::FileRoundTrip, Strategy::Direct])
            .with_temp_dir(dir.path());
        let repaired = pipeline.repair(&sample_png(3, 3)).unwrap();
        assert_eq!(repaired.strategy, Strategy::FileRoundTrip);
    }

    #[test]
    fn pipeline_fails_fast_on_signature() {
        let err = RepairPipeline::new().repair(b"\xff\xd8\xff\xe0 not a png").unwrap_err();
        assert!(matches!(err, RepairError::BadSignature));
    }

    #[test]
    fn pipeline_exhausted_on_garbage_body() {
        let mut bytes = crate::PNG_SIGNATURE.to_vec();
        bytes.extend_from_slice(&[0x42; 64]);
        let err = RepairPipeline::new().repair(&bytes).unwrap_err();
        assert!(matches!(err, RepairError::Exhausted { attempts: 4 }));
    }

    #[test]
    fn strategy_display() {
        assert_eq!(Strategy::Direct.to_string(), "direct");
        assert_eq!(Strategy::FileRoundTrip.to_string(), "file_round_trip");
    }
}
