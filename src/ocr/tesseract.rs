//! Tesseract OCR engine.

use std::fs::read_to_string;

use async_trait::async_trait;
use image::{ImageFormat, RgbImage};
use tokio::process::Command;

use crate::{
    command::{DEFAULT_ERROR_REGEX, check_for_command_failure},
    prelude::*,
};

use super::{OcrEngine, OcrOptions};

/// OCR engine wrapping the `tesseract` CLI tool.
#[derive(Default)]
#[non_exhaustive]
pub struct TesseractOcrEngine {}

impl TesseractOcrEngine {
    /// Create a new `tesseract` engine.
    pub fn new() -> Self {
        Self {}
    }
}

/// Build the argument list for one `tesseract` run. `output_base` has no
/// extension; `tesseract` appends `.txt` itself.
fn tesseract_args(input_path: &Path, output_base: &Path, opts: &OcrOptions) -> Vec<String> {
    let mut args = vec![
        input_path.display().to_string(),
        output_base.display().to_string(),
        "-l".to_owned(),
        opts.language.clone(),
    ];
    args.extend(opts.config.split_whitespace().map(str::to_owned));
    args
}

#[async_trait]
impl OcrEngine for TesseractOcrEngine {
    #[instrument(level = "debug", skip_all, fields(width = image.width(), height = image.height()))]
    async fn ocr_image(&self, image: &RgbImage, opts: &OcrOptions) -> Result<String> {
        // Write our input to a temporary file. PNG is lossless, so tesseract
        // sees exactly the pixels we decoded.
        let tmpdir = tempfile::TempDir::with_prefix("tesseract")?;
        let input_path = tmpdir.path().join("input.png");
        let output_path = tmpdir.path().join("output.txt");
        image
            .save_with_format(&input_path, ImageFormat::Png)
            .context("cannot write tesseract input file")?;

        // Run tesseract on the input file.
        let output = Command::new("tesseract")
            .args(tesseract_args(
                &input_path,
                &output_path.with_extension(""),
                opts,
            ))
            .output()
            .await
            .context("cannot run tesseract (is it installed and on your PATH?)")?;
        check_for_command_failure("tesseract", &output, Some(&*DEFAULT_ERROR_REGEX))?;

        // Read the output file.
        read_to_string(&output_path).context("cannot read tesseract output file")
    }
}
