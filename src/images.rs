//! Decode page images into memory.

use image::{ImageReader, RgbImage};

use crate::prelude::*;

/// Decode a single page image, converting it to 8-bit RGB.
///
/// The format is detected from the file contents, so a PNG saved with a
/// `.jpg` name still loads.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub fn load_image(path: &Path) -> Result<RgbImage> {
    let image = ImageReader::open(path)
        .with_context(|| format!("failed to open image {:?}", path.display()))?
        .with_guessed_format()
        .with_context(|| format!("failed to read image {:?}", path.display()))?
        .decode()
        .with_context(|| format!("failed to decode image {:?}", path.display()))?;
    Ok(image.to_rgb8())
}

/// Decode every page, in order. Stops at the first file that cannot be
/// decoded.
pub fn load_images(paths: &[PathBuf]) -> Result<Vec<RgbImage>> {
    paths.iter().map(|path| load_image(path)).collect()
}
