//! Writing our results to disk.

use std::ffi::OsString;

use crate::prelude::*;

pub mod pdf;
pub mod text;

/// Append `.ext` to an output stem. Unlike [`Path::with_extension`], this
/// never replaces anything already in the stem, so `scan.v2` becomes
/// `scan.v2.txt`.
pub fn output_path(stem: &Path, ext: &str) -> PathBuf {
    let mut path = OsString::from(stem.as_os_str());
    path.push(".");
    path.push(ext);
    PathBuf::from(path)
}
