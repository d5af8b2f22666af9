//! Extracting text from page images.
//!
//! The actual recognition is done by an [`OcrEngine`]. In production, that's
//! [`tesseract::TesseractOcrEngine`], but anything that can turn an image
//! into a string will do.

use async_trait::async_trait;
use clap::Args;
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::{
    prelude::*,
    ui::{ProgressConfig, Ui},
};

pub mod tesseract;

/// Options passed through to the OCR engine.
#[derive(Args, Clone, Debug)]
pub struct OcrOptions {
    /// The OCR language model to use.
    #[clap(short = 'l', long = "lang", default_value = "eng")]
    pub language: String,

    /// Extra arguments for the OCR engine, separated by whitespace. The
    /// default `--psm 6` tells tesseract to assume a single uniform block of
    /// text.
    #[clap(long = "ocr-config", default_value = "--psm 6", allow_hyphen_values = true)]
    pub config: String,
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self {
            language: "eng".to_owned(),
            config: "--psm 6".to_owned(),
        }
    }
}

/// The text extracted from a set of pages.
///
/// `pages[i]` is the text of the `i`th input image. This is also the shape of
/// our JSON output.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    /// The text of each page, in page order.
    pub pages: Vec<String>,
}

impl Extraction {
    /// All page text run together, with no separators.
    pub fn concatenated(&self) -> String {
        self.pages.concat()
    }
}

/// Interface to an OCR engine.
#[async_trait]
pub trait OcrEngine: Send + Sync + 'static {
    /// Recognize the text in a single image.
    async fn ocr_image(&self, image: &RgbImage, opts: &OcrOptions) -> Result<String>;
}

/// OCR each image in turn, showing a progress bar as we go.
///
/// Pages are processed strictly one after another, and the first engine
/// failure aborts the whole run.
#[instrument(level = "debug", skip_all, fields(pages = images.len(), lang = %opts.language))]
pub async fn extract_text(
    ui: &Ui,
    engine: &dyn OcrEngine,
    images: &[RgbImage],
    opts: &OcrOptions,
) -> Result<Extraction> {
    let pb = ui.new_progress_bar(
        &ProgressConfig {
            emoji: "📄",
            msg: "OCRing pages",
            done_msg: "OCRed pages",
        },
        images.len() as u64,
    );

    let mut pages = Vec::with_capacity(images.len());
    for (page_idx, image) in images.iter().enumerate() {
        let text = engine
            .ocr_image(image, opts)
            .await
            .with_context(|| format!("failed to OCR page {}", page_idx + 1))?;
        trace!(page = page_idx + 1, chars = text.len(), "OCRed page");
        pages.push(text);
        pb.inc(1);
    }
    pb.finish_using_style();
    Ok(Extraction { pages })
}
