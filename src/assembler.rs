//! Chapter assembly: ordered pages in, one CBZ archive out.
//!
//! The archive is written to a `.cbz.tmp` sibling and renamed into place, so
//! a crash never leaves a partial file under the final chapter name. Entry
//! options are pinned so identical input bytes always produce an identical
//! archive.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

use crate::error::{Error, Result};
use crate::models::ChapterNumber;
use crate::util::sanitize_filename;

/// One page ready for packaging.
#[derive(Debug, Clone)]
pub struct PagePayload {
    pub index: usize,
    /// Extension without the dot (`jpg`, `png`, ...).
    pub ext: String,
    pub bytes: Bytes,
}

/// Final archive path: `<root>/<Series Title>/Chapter <N>.cbz`.
pub fn archive_path(root: &Path, series_title: &str, number: ChapterNumber) -> PathBuf {
    root.join(sanitize_filename(series_title))
        .join(format!("Chapter {number}.cbz"))
}

/// Package a complete chapter.
///
/// The page set must cover exactly `0..N-1`; gaps or duplicates are
/// `IncompleteChapter`, which signals "retry the chapter" rather than
/// "archive is done but corrupt". Entries are written in index order under
/// zero-padded names so any standard reader shows pages in reading order.
pub fn assemble(
    root: &Path,
    series_title: &str,
    number: ChapterNumber,
    mut pages: Vec<PagePayload>,
) -> Result<PathBuf> {
    verify_contiguous(&pages)?;
    pages.sort_by_key(|p| p.index);

    let final_path = archive_path(root, series_title, number);
    if let Some(parent) = final_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = final_path.with_extension("cbz.tmp");

    let result = write_archive(&tmp_path, &pages);
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    fs::rename(&tmp_path, &final_path)?;
    log::info!(
        "assembled {} ({} pages) -> {}",
        number,
        pages.len(),
        final_path.display()
    );
    Ok(final_path)
}

fn write_archive(tmp_path: &Path, pages: &[PagePayload]) -> Result<()> {
    let file = File::create(tmp_path)?;
    let mut zip = ZipWriter::new(file);
    // Fixed timestamp and compression keep archives reproducible.
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());

    for page in pages {
        zip.start_file(format!("{:03}.{}", page.index, page.ext), options)?;
        zip.write_all(&page.bytes)?;
    }

    let file = zip.finish()?;
    file.sync_all()?;
    Ok(())
}

fn verify_contiguous(pages: &[PagePayload]) -> Result<()> {
    let expected = pages.len();
    let mut seen = vec![false; expected];
    for page in pages {
        if page.index >= expected || seen[page.index] {
            return Err(Error::IncompleteChapter {
                expected,
                got: pages.iter().filter(|p| p.index < expected).count(),
            });
        }
        seen[page.index] = true;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn payload(index: usize, data: &[u8]) -> PagePayload {
        PagePayload {
            index,
            ext: "jpg".to_string(),
            bytes: Bytes::copy_from_slice(data),
        }
    }

    fn entry_names(path: &Path) -> Vec<String> {
        let file = File::open(path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn writes_entries_in_index_order_regardless_of_input_order() {
        let dir = TempDir::new().unwrap();
        let pages = vec![payload(2, b"c"), payload(0, b"a"), payload(1, b"b")];
        let path = assemble(
            dir.path(),
            "Test Series",
            ChapterNumber::parse("3").unwrap(),
            pages,
        )
        .unwrap();
        assert_eq!(entry_names(&path), ["000.jpg", "001.jpg", "002.jpg"]);
        assert!(path.ends_with("Test Series/Chapter 3.cbz"));
    }

    #[test]
    fn gap_is_incomplete() {
        let dir = TempDir::new().unwrap();
        let pages = vec![payload(0, b"a"), payload(2, b"c")];
        let err = assemble(
            dir.path(),
            "Test Series",
            ChapterNumber::parse("1").unwrap(),
            pages,
        )
        .unwrap_err();
        assert!(matches!(err, Error::IncompleteChapter { expected: 2, .. }));
    }

    #[test]
    fn duplicate_index_is_incomplete() {
        let dir = TempDir::new().unwrap();
        let pages = vec![payload(0, b"a"), payload(0, b"b")];
        let err = assemble(
            dir.path(),
            "Test Series",
            ChapterNumber::parse("1").unwrap(),
            pages,
        )
        .unwrap_err();
        assert!(matches!(err, Error::IncompleteChapter { .. }));
    }

    #[test]
    fn no_partial_file_left_on_failure() {
        let dir = TempDir::new().unwrap();
        let pages = vec![payload(0, b"a"), payload(3, b"d")];
        let _ = assemble(
            dir.path(),
            "Test Series",
            ChapterNumber::parse("2").unwrap(),
            pages,
        );
        let series_dir = dir.path().join("Test Series");
        if series_dir.exists() {
            let leftovers: Vec<_> = fs::read_dir(&series_dir).unwrap().collect();
            assert!(leftovers.is_empty(), "found leftovers: {leftovers:?}");
        }
    }

    #[test]
    fn identical_inputs_produce_identical_archives() {
        let dir_a = TempDir::new().unwrap();
        let dir_b = TempDir::new().unwrap();
        let pages = || vec![payload(0, b"aaaa"), payload(1, b"bbbb")];
        let a = assemble(
            dir_a.path(),
            "S",
            ChapterNumber::parse("5").unwrap(),
            pages(),
        )
        .unwrap();
        let b = assemble(
            dir_b.path(),
            "S",
            ChapterNumber::parse("5").unwrap(),
            pages(),
        )
        .unwrap();
        assert_eq!(fs::read(a).unwrap(), fs::read(b).unwrap());
    }

    #[test]
    fn mixed_extensions_are_preserved() {
        let dir = TempDir::new().unwrap();
        let pages = vec![
            PagePayload {
                index: 0,
                ext: "webp".into(),
                bytes: Bytes::from_static(b"w"),
            },
            PagePayload {
                index: 1,
                ext: "png".into(),
                bytes: Bytes::from_static(b"p"),
            },
        ];
        let path = assemble(
            dir.path(),
            "S",
            ChapterNumber::parse("7.5").unwrap(),
            pages,
        )
        .unwrap();
        assert_eq!(entry_names(&path), ["000.webp", "001.png"]);
        assert!(path.ends_with("S/Chapter 7.5.cbz"));
    }
}
