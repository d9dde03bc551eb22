//! Output path planning.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::types::BatchItem;

/// Assigns unique output paths to the items of a batch.
///
/// Items are walked in submission order. The first item claiming a path keeps
/// it; later claims get `_1`, `_2`, ... inserted before the extension.
#[derive(Debug)]
pub struct OutputPlanner {
    claimed: HashSet<PathBuf>,
    respect_existing: bool,
}

impl OutputPlanner {
    /// `respect_existing` treats files already on disk as taken.
    pub fn new(respect_existing: bool) -> Self {
        Self {
            claimed: HashSet::new(),
            respect_existing,
        }
    }

    /// Rewrites the `expected_output` of every item that carries one.
    pub fn plan(mut self, items: Vec<BatchItem>) -> Vec<BatchItem> {
        items
            .into_iter()
            .map(|item| match item.expected_output() {
                Some(path) => {
                    let unique = self.claim(&path);
                    if unique != path {
                        tracing::debug!(
                            item = %item.id,
                            from = %path.display(),
                            to = %unique.display(),
                            "Renamed duplicate output path"
                        );
                    }
                    item.with_expected_output(unique)
                }
                None => item,
            })
            .collect()
    }

    /// Claims `path` or the first free suffixed variant of it.
    pub fn claim(&mut self, path: &Path) -> PathBuf {
        if self.is_free(path) {
            self.claimed.insert(path.to_path_buf());
            return path.to_path_buf();
        }

        let mut counter = 1;
        loop {
            let candidate = suffixed(path, counter);
            if self.is_free(&candidate) {
                self.claimed.insert(candidate.clone());
                return candidate;
            }
            counter += 1;
        }
    }

    fn is_free(&self, path: &Path) -> bool {
        !self.claimed.contains(path) && !(self.respect_existing && path.exists())
    }
}

/// `dir/name.ext` -> `dir/name_{n}.ext`.
pub fn suffixed(path: &Path, n: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}_{}.{}", stem, n, ext.to_string_lossy()),
        None => format!("{}_{}", stem, n),
    };
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_suffixed() {
        assert_eq!(
            suffixed(Path::new("/out/title.md"), 1),
            PathBuf::from("/out/title_1.md")
        );
        assert_eq!(
            suffixed(Path::new("/out/archive.tar.gz"), 2),
            PathBuf::from("/out/archive.tar_2.gz")
        );
        assert_eq!(suffixed(Path::new("/out/README"), 3), PathBuf::from("/out/README_3"));
    }

    #[test]
    fn test_duplicates_follow_submission_order() {
        let items = vec![
            BatchItem::new("1", "u1").with_expected_output("/out/title.md"),
            BatchItem::new("2", "u2").with_expected_output("/out/other.md"),
            BatchItem::new("3", "u3").with_expected_output("/out/title.md"),
            BatchItem::new("4", "u4").with_expected_output("/out/title.md"),
            BatchItem::new("5", "u5"),
        ];

        let planned = OutputPlanner::new(false).plan(items);

        assert_eq!(planned[0].expected_output(), Some(PathBuf::from("/out/title.md")));
        assert_eq!(planned[1].expected_output(), Some(PathBuf::from("/out/other.md")));
        assert_eq!(planned[2].expected_output(), Some(PathBuf::from("/out/title_1.md")));
        assert_eq!(planned[3].expected_output(), Some(PathBuf::from("/out/title_2.md")));
        assert!(planned[4].expected_output().is_none());
    }

    #[test]
    fn test_existing_files_taken_when_respected() {
        let dir = TempDir::new().unwrap();
        let existing = dir.path().join("page.md");
        std::fs::write(&existing, "old").unwrap();

        let mut planner = OutputPlanner::new(true);
        assert_eq!(planner.claim(&existing), dir.path().join("page_1.md"));

        let mut planner = OutputPlanner::new(false);
        assert_eq!(planner.claim(&existing), existing);
    }
}
