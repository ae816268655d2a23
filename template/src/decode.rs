//! Lenient base64 decoding for enrolled templates.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine;

use crate::error::TemplateError;

/// Accepts missing or superfluous padding and non-zero trailing bits.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Removes a leading `data:image/<subtype>;base64,` prefix, if present.
pub fn strip_data_url(s: &str) -> &str {
    let trimmed = s.trim_start();
    if let Some(rest) = trimmed.strip_prefix("data:image/") {
        if let Some((_, payload)) = rest.split_once(',') {
            return payload;
        }
    }
    trimmed
}

/// Strips the data-URL prefix and every character outside the standard
/// base64 alphabet (whitespace, line breaks, quotes, stray punctuation).
pub fn clean_base64(s: &str) -> String {
    strip_data_url(s)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '='))
        .collect()
}

/// Drops all `=` and pads back to a multiple of 4 characters.
pub fn repad(s: &str) -> String {
    let mut out: String = s.chars().filter(|&c| c != '=').collect();
    let rem = out.len() % 4;
    if rem != 0 {
        out.extend(std::iter::repeat_n('=', 4 - rem));
    }
    out
}

/// Decodes template text into raw image bytes.
///
/// The text is cleaned first. If strict decoding fails, decoding is retried
/// exactly once with re-padded text and a lenient engine.
pub fn decode_template(s: &str) -> Result<Vec<u8>, TemplateError> {
    let cleaned = clean_base64(s);
    if cleaned.trim_matches('=').is_empty() {
        return Err(TemplateError::Empty);
    }
    match STANDARD.decode(&cleaned) {
        Ok(bytes) => Ok(bytes),
        Err(first) => {
            tracing::debug!(error = %first, len = cleaned.len(), "template: retrying with re-padded base64");
            Ok(LENIENT.decode(repad(&cleaned))?)
        }
    }
}
