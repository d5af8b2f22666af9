//! Find the page images to process.

use crate::prelude::*;

/// List the files in `dir` whose names end with `suffix`, sorted by path.
///
/// The match is an exact, case-sensitive suffix match on the file name, so
/// `"jpg"` will not pick up `scan.JPG`. Subdirectories are skipped, not
/// searched. Page order in every output follows the order returned here.
#[instrument(level = "debug", skip_all, fields(dir = %dir.display(), suffix = %suffix))]
pub fn list_pages(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    let mut pages = dir
        .read_dir()
        .with_context(|| format!("failed to read page directory {:?}", dir.display()))?
        .filter_map(|entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    return Some(Err::<PathBuf, _>(err).with_context(|| {
                        format!("failed to read entry in {:?}", dir.display())
                    }));
                }
            };
            let name = entry.file_name();
            if !name.as_encoded_bytes().ends_with(suffix.as_bytes()) {
                return None;
            }
            match entry.file_type() {
                Ok(file_type) if file_type.is_dir() => {
                    debug!(name = ?name, "Skipping directory");
                    None
                }
                Ok(_) => Some(Ok(dir.join(name))),
                Err(err) => Some(Err::<PathBuf, _>(err).with_context(|| {
                    format!("failed to stat {:?}", entry.path().display())
                })),
            }
        })
        .collect::<Result<Vec<_>>>()?;
    pages.sort();
    debug!(count = pages.len(), "Found pages");
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn touch_all(dir: &Path, names: &[&str]) {
        for name in names {
            fs::write(dir.join(name), b"").unwrap();
        }
    }

    #[test]
    fn lists_matching_files_in_sorted_order() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        touch_all(tmp.path(), &["c.jpg", "a.jpg", "notes.txt", "b.jpg", "d.png"]);

        let pages = list_pages(tmp.path(), "jpg")?;
        let names = pages
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(names, ["a.jpg", "b.jpg", "c.jpg"]);
        assert!(pages.iter().all(|p| p.starts_with(tmp.path())));
        Ok(())
    }

    #[test]
    fn suffix_match_is_case_sensitive() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        touch_all(tmp.path(), &["upper.JPG", "lower.jpg"]);

        let pages = list_pages(tmp.path(), "jpg")?;
        assert_eq!(pages, vec![tmp.path().join("lower.jpg")]);
        Ok(())
    }

    #[test]
    fn suffix_is_not_required_to_be_an_extension() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        touch_all(tmp.path(), &["page1_scan.png", "page1_thumb.png"]);

        let pages = list_pages(tmp.path(), "_scan.png")?;
        assert_eq!(pages, vec![tmp.path().join("page1_scan.png")]);
        Ok(())
    }

    #[test]
    fn does_not_recurse_into_subdirectories() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        fs::create_dir(tmp.path().join("nested.jpg"))?;
        touch_all(tmp.path(), &["top.jpg"]);
        touch_all(&tmp.path().join("nested.jpg"), &["inner.jpg"]);

        let pages = list_pages(tmp.path(), "jpg")?;
        assert_eq!(pages, vec![tmp.path().join("top.jpg")]);
        Ok(())
    }

    #[test]
    fn empty_directory_returns_no_pages() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        assert!(list_pages(tmp.path(), "jpg")?.is_empty());
        Ok(())
    }

    #[test]
    fn other_suffix_matches_nothing() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        touch_all(tmp.path(), &["a.jpg", "b.jpg"]);
        assert!(list_pages(tmp.path(), "png")?.is_empty());
        Ok(())
    }

    #[test]
    fn missing_directory_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = list_pages(&tmp.path().join("missing"), "jpg").unwrap_err();
        assert!(err.to_string().contains("failed to read page directory"));
    }
}
