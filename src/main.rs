use std::str::FromStr;

use clap::Parser;
use tracing_subscriber::{
    EnvFilter, Layer as _, filter::Directive, fmt::format::FmtSpan, layer::SubscriberExt,
    util::SubscriberInitExt as _,
};

use self::{prelude::*, ui::Ui};

mod command;
mod images;
mod ocr;
mod output;
mod pages;
mod pipeline;
mod prelude;
mod ui;

/// Convert a directory of scanned page images into text and a merged PDF.
#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    after_help = r#"
Requirements:
  The `tesseract` executable must be on your PATH, along with the
  trained data for the language passed to `--lang`.

Environment Variables:
  - RUST_LOG (optional): Override the log level (default: info).
  - TESSDATA_PREFIX (optional): Where tesseract looks for trained data.

  These variables may be set in a standard `.env` file.
"#
)]
struct Opts {
    #[clap(flatten)]
    pipeline: pipeline::PipelineOpts,
}

/// Our entry point, which can return an error. [`anyhow::Result`] will
/// automatically print a nice error message with optional backtrace.
///
/// Pages are processed one at a time, so a single-threaded runtime is all we
/// need to drive the `tesseract` subprocesses.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load environment variables from a `.env` file, if it exists. This
    // needs to happen before we read `RUST_LOG`.
    dotenvy::dotenv().ok();

    let ui = Ui::init();

    // Initialize tracing.
    let directive =
        Directive::from_str("info").expect("built-in directive should be valid");
    let env_filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_writer(ui.get_stderr_writer())
        .with_filter(env_filter);

    tracing_subscriber::registry().with(subscriber).init();

    // Call our real `main` function now that logging is set up.
    real_main(ui).await
}

/// Our real entry point.
#[instrument(level = "debug", name = "main", skip_all)]
async fn real_main(ui: Ui) -> Result<()> {
    // Parse command-line arguments.
    let opts = Opts::parse();
    debug!("Parsed options: {:?}", opts);

    let engine = ocr::tesseract::TesseractOcrEngine::new();
    let summary = pipeline::run(&ui, &engine, &opts.pipeline).await?;
    info!(
        pages = summary.page_count,
        text = ?summary.text_path,
        pdf = ?summary.pdf_path,
        "Finished converting pages"
    );
    Ok(())
}
