//! The whole conversion: list pages, load them, OCR them, write the results.

use clap::Args;

use crate::{
    images::load_images,
    ocr::{OcrEngine, OcrOptions, extract_text},
    output::{pdf::write_pdf, text::write_text},
    pages::list_pages,
    prelude::*,
    ui::Ui,
};

/// Options controlling a conversion run.
#[derive(Args, Clone, Debug)]
pub struct PipelineOpts {
    /// Only process files whose names end with this suffix (case-sensitive).
    #[clap(short = 'f', long = "filetype", default_value = "jpg")]
    pub filetype: String,

    /// The directory containing the page images.
    #[clap(short = 'i', long = "input-dir", default_value = "pages/")]
    pub input_dir: PathBuf,

    /// The output filename, without an extension.
    #[clap(short = 'o', long = "output", default_value = "output")]
    pub output_stem: PathBuf,

    /// Text output format: "txt" or "json". Any other value skips the text
    /// output with a warning.
    #[clap(long = "format", default_value = "txt")]
    pub format: String,

    /// Don't write a PDF of the pages.
    #[clap(long)]
    pub no_pdf: bool,

    #[clap(flatten)]
    pub ocr: OcrOptions,
}

/// What a run produced.
#[derive(Debug)]
pub struct RunSummary {
    /// How many pages we processed.
    pub page_count: usize,
    /// The text or JSON report, if one was written.
    pub text_path: Option<PathBuf>,
    /// The PDF, if one was written.
    pub pdf_path: Option<PathBuf>,
}

/// Run the full conversion. Every stage finishes before the next begins, and
/// the first error stops the run.
#[instrument(level = "debug", skip_all, fields(input_dir = %opts.input_dir.display()))]
pub async fn run(ui: &Ui, engine: &dyn OcrEngine, opts: &PipelineOpts) -> Result<RunSummary> {
    let pages = list_pages(&opts.input_dir, &opts.filetype)?;
    info!(
        count = pages.len(),
        "Found pages ending in {:?} in {:?}",
        opts.filetype,
        opts.input_dir.display()
    );

    let images = load_images(&pages)?;
    let extraction = extract_text(ui, engine, &images, &opts.ocr).await?;
    // The decoded images can be large, and the PDF re-reads the originals.
    drop(images);

    let text_path = write_text(&extraction, &opts.format, &opts.output_stem)?;
    let pdf_path = if opts.no_pdf {
        None
    } else {
        write_pdf(&pages, &opts.output_stem)?
    };

    Ok(RunSummary {
        page_count: pages.len(),
        text_path,
        pdf_path,
    })
}
