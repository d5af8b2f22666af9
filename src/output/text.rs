//! Text and JSON reports.

use std::{fs, str::FromStr};

use crate::{ocr::Extraction, prelude::*};

use super::output_path;

/// The text report formats we know how to write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextFormat {
    /// All page text run together in `<stem>.txt`.
    Txt,
    /// The full [`Extraction`] record in `<stem>.json`.
    Json,
}

impl TextFormat {
    /// The file extension for this format.
    pub fn extension(self) -> &'static str {
        match self {
            TextFormat::Txt => "txt",
            TextFormat::Json => "json",
        }
    }
}

impl FromStr for TextFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "txt" => Ok(TextFormat::Txt),
            "json" => Ok(TextFormat::Json),
            _ => Err(anyhow!("unknown text format {:?}", s)),
        }
    }
}

/// Write `extraction` to `<stem>.txt` or `<stem>.json`, depending on `format`.
///
/// An unrecognized `format` is not an error: we log a warning, write nothing,
/// and return `Ok(None)`. Otherwise we return the path we wrote.
#[instrument(level = "debug", skip_all, fields(format = %format, stem = %stem.display()))]
pub fn write_text(
    extraction: &Extraction,
    format: &str,
    stem: &Path,
) -> Result<Option<PathBuf>> {
    let format = match format.parse::<TextFormat>() {
        Ok(format) => format,
        Err(err) => {
            warn!("{}; choose between \"txt\" and \"json\". No text file written.", err);
            return Ok(None);
        }
    };

    let path = output_path(stem, format.extension());
    let contents = match format {
        TextFormat::Txt => extraction.concatenated(),
        TextFormat::Json => {
            serde_json::to_string(extraction).context("failed to serialize pages")?
        }
    };
    fs::write(&path, contents)
        .with_context(|| format!("failed to write {:?}", path.display()))?;
    debug!(path = %path.display(), "Wrote text report");
    Ok(Some(path))
}

/// Read a JSON report written by [`write_text`].
pub fn read_json(path: &Path) -> Result<Extraction> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read {:?}", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("failed to parse {:?}", path.display()))
}
