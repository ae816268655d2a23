//! Utility functions for CLI commands.

use std::path::Path;

use anyhow::Context;
use fpid_template::{TemplateError, decode_template, detect_corruption, has_png_signature};

/// A template file as found on disk.
pub enum TemplateInput {
    /// Raw PNG bytes.
    Png(Vec<u8>),
    /// Base64 template text, as stored by the record store.
    Text(String),
}

impl TemplateInput {
    /// Reads a template file. Files starting with the PNG signature are raw
    /// bytes; anything else must be UTF-8 base64 text.
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
        if has_png_signature(&data) {
            return Ok(Self::Png(data));
        }
        let text = String::from_utf8(data)
            .with_context(|| format!("{} is neither PNG nor base64 text", path.display()))?;
        Ok(Self::Text(text))
    }

    pub fn decode(&self) -> Result<Vec<u8>, TemplateError> {
        match self {
            Self::Png(bytes) => Ok(bytes.clone()),
            Self::Text(text) => decode_template(text),
        }
    }

    /// The record store's verdict: text that does not decode to a
    /// PNG-signed payload is corrupt.
    pub fn is_corrupt(&self) -> bool {
        match self {
            Self::Png(_) => false,
            Self::Text(text) => detect_corruption(text),
        }
    }
}

/// Reads a template file and decodes it to raw bytes.
pub fn read_template(path: &Path) -> anyhow::Result<Vec<u8>> {
    TemplateInput::read(path)?
        .decode()
        .with_context(|| format!("decode {}", path.display()))
}

/// Outputs a report as JSON or YAML.
pub fn output_result<T: serde::Serialize>(
    result: &T,
    output_path: Option<&str>,
    as_json: bool,
) -> anyhow::Result<()> {
    let output = if as_json {
        serde_json::to_string_pretty(result)? + "\n"
    } else {
        serde_yaml::to_string(result)?
    };

    match output_path {
        Some(path) => std::fs::write(path, output)?,
        None => print!("{}", output),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_raw_png_and_base64_text() {
        let dir = tempfile::tempdir().unwrap();
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];

        let raw = dir.path().join("t.png");
        std::fs::write(&raw, png).unwrap();
        assert_eq!(read_template(&raw).unwrap(), png);
        assert!(matches!(TemplateInput::read(&raw).unwrap(), TemplateInput::Png(_)));

        let text = dir.path().join("t.b64");
        std::fs::write(&text, "data:image/png;base64,iVBORw0KGgoAAA==\n").unwrap();
        assert_eq!(read_template(&text).unwrap(), png);
        assert!(!TemplateInput::read(&text).unwrap().is_corrupt());

        let empty = dir.path().join("empty.b64");
        std::fs::write(&empty, "").unwrap();
        assert!(read_template(&empty).is_err());
        assert!(TemplateInput::read(&empty).unwrap().is_corrupt());
    }
}
