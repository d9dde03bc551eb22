//! Item source resolvers.
//!
//! Turn a URL list or a directory scan into the ordered [`BatchItem`]s a
//! batch runs over, each carrying its planned output path.

mod directory;
mod naming;

pub use directory::{scan_directory, FileClass};
pub use naming::{filename_from_url, sanitize_filename, youtube_video_id};

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::batch::BatchItem;
use crate::converter::ConverterKind;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Invalid file pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("No items to process")]
    Empty,

    #[error("Unsupported source: {0}")]
    Unsupported(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Items for a URL-based batch, in submission order.
///
/// Item ids are the 1-based position. Output names derive from the URL
/// (or the video id for YouTube); collisions are resolved later by the
/// output planner.
pub fn items_from_urls(
    kind: ConverterKind,
    urls: &[String],
    output_dir: Option<&Path>,
) -> Result<Vec<BatchItem>, SourceError> {
    if urls.is_empty() {
        return Err(SourceError::Empty);
    }

    urls.iter()
        .enumerate()
        .map(|(i, raw)| {
            let url = raw.trim();
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(SourceError::InvalidUrl(raw.clone()));
            }

            let mut item = BatchItem::new((i + 1).to_string(), url);
            if let Some(dir) = output_dir {
                let stem = match kind {
                    ConverterKind::Youtube => youtube_video_id(url)
                        .map(|id| sanitize_filename(&id, "video"))
                        .unwrap_or_else(|| filename_from_url(url)),
                    _ => filename_from_url(url),
                };
                item = item.with_expected_output(dir.join(format!("{}.md", stem)));
            }
            Ok(item)
        })
        .collect()
}

/// Items for a file-based batch. Each output is `<stem>.md` in
/// `output_dir`, or next to the source file when no directory is given.
pub fn items_from_files(files: &[PathBuf], output_dir: Option<&Path>) -> Vec<BatchItem> {
    files
        .iter()
        .enumerate()
        .map(|(i, file)| {
            let stem = file
                .file_stem()
                .and_then(|s| s.to_str())
                .map(|s| sanitize_filename(s, "file"))
                .unwrap_or_else(|| "file".to_string());
            let dir = output_dir
                .map(Path::to_path_buf)
                .or_else(|| file.parent().map(Path::to_path_buf))
                .unwrap_or_default();

            let mut item = BatchItem::new((i + 1).to_string(), file.to_string_lossy())
                .with_expected_output(dir.join(format!("{}.md", stem)));
            if let Ok(meta) = std::fs::metadata(file) {
                let size_mb = meta.len() as f64 / (1024.0 * 1024.0);
                item = item.with_metadata("file_size_mb", size_mb);
            }
            item
        })
        .collect()
}

/// Total size in MB of file items that recorded one.
pub fn total_size_mb(items: &[BatchItem]) -> f64 {
    items
        .iter()
        .filter_map(|item| item.metadata.get("file_size_mb"))
        .filter_map(serde_json::Value::as_f64)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_items_from_urls() {
        let urls = vec![
            "https://example.com/a".to_string(),
            " https://example.com/b ".to_string(),
        ];
        let items = items_from_urls(ConverterKind::Webpage, &urls, Some(Path::new("/out"))).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "1");
        assert_eq!(items[1].source, "https://example.com/b");
        assert_eq!(
            items[0].expected_output(),
            Some(PathBuf::from("/out/example_com_a.md"))
        );
    }

    #[test]
    fn test_youtube_items_use_video_id() {
        let urls = vec!["https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string()];
        let items = items_from_urls(ConverterKind::Youtube, &urls, Some(Path::new("/out"))).unwrap();
        assert_eq!(
            items[0].expected_output(),
            Some(PathBuf::from("/out/dQw4w9WgXcQ.md"))
        );
    }

    #[test]
    fn test_items_without_output_dir() {
        let urls = vec!["https://example.com".to_string()];
        let items = items_from_urls(ConverterKind::Webpage, &urls, None).unwrap();
        assert_eq!(items[0].expected_output(), None);
    }

    #[test]
    fn test_invalid_and_empty_urls() {
        let bad = vec!["ftp://example.com".to_string()];
        assert!(matches!(
            items_from_urls(ConverterKind::Webpage, &bad, None),
            Err(SourceError::InvalidUrl(_))
        ));
        assert!(matches!(
            items_from_urls(ConverterKind::Webpage, &[], None),
            Err(SourceError::Empty)
        ));
    }

    #[test]
    fn test_items_from_files() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("talk one.mp3");
        std::fs::write(&file, vec![0u8; 1024 * 1024]).unwrap();

        let items = items_from_files(&[file.clone()], None);
        assert_eq!(items[0].source, file.to_string_lossy());
        assert_eq!(
            items[0].expected_output(),
            Some(dir.path().join("talk_one.md"))
        );
        assert!((total_size_mb(&items) - 1.0).abs() < 1e-9);

        let out = TempDir::new().unwrap();
        let items = items_from_files(&[file], Some(out.path()));
        assert_eq!(items[0].expected_output(), Some(out.path().join("talk_one.md")));
    }
}
