//! Directory scanning for file-based batches.

use globset::{GlobBuilder, GlobMatcher};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use super::SourceError;

const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "mp4", "wav", "m4a", "mov", "avi", "mkv", "flac", "ogg", "webm",
];
const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "docx", "pptx", "xlsx"];

/// Which files a directory scan picks up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileClass {
    Audio,
    Document,
}

impl FileClass {
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Audio => AUDIO_EXTENSIONS,
            Self::Document => DOCUMENT_EXTENSIONS,
        }
    }

    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions().contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }
}

/// Compiles `pattern`; `*` and `?` never cross a path separator.
fn compile_pattern(pattern: &str) -> Result<GlobMatcher, SourceError> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| SourceError::InvalidPattern(format!("{}: {}", pattern, e)))
}

/// Files under `dir` matching `pattern` whose extension belongs to `class`,
/// sorted by path.
///
/// A pattern without a separator is matched against the file name at any
/// depth; one with a separator (`talks/*.mp3`, `**/*.pdf`) against the path
/// relative to `dir`. Symlinks are not followed.
pub fn scan_directory(
    dir: &Path,
    pattern: &str,
    recursive: bool,
    class: FileClass,
) -> Result<Vec<PathBuf>, SourceError> {
    if !dir.exists() {
        return Err(SourceError::DirectoryNotFound(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(SourceError::NotADirectory(dir.to_path_buf()));
    }

    let pattern = if pattern.is_empty() { "*" } else { pattern };
    let matcher = compile_pattern(pattern)?;
    let match_relative = pattern.contains('/');

    let mut walker = WalkDir::new(dir).min_depth(1);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let name_matches = if match_relative {
            path.strip_prefix(dir)
                .map(|rel| matcher.is_match(rel))
                .unwrap_or(false)
        } else {
            matcher.is_match(entry.file_name())
        };
        if name_matches && class.matches(path) {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    info!(dir = %dir.display(), found = files.len(), class = ?class, "Scanned directory");
    Ok(files)
}
