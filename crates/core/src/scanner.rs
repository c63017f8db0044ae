use crate::config::normalize_extension;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Scanner for regular files below a tree root, filtered by extension.
///
/// Siblings are visited in file-name order so "last one wins" rules that
/// depend on traversal order are reproducible across platforms.
pub struct TreeScanner {
    root: PathBuf,
    extensions: Vec<String>,
    excluded: Vec<PathBuf>,
}

impl TreeScanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            extensions: Vec::new(),
            excluded: Vec::new(),
        }
    }

    /// Only yield files with one of these extensions (case-insensitive).
    /// An empty list yields every file.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|ext| normalize_extension(ext.as_ref()))
            .collect();
        self
    }

    /// Never descend into these directories
    pub fn excluding<I>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        self.excluded = roots
            .into_iter()
            .map(|root| root.canonicalize().unwrap_or(root))
            .collect();
        self
    }

    pub fn scan(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();

        // links are not followed, so below the resolved root every directory
        // path is already canonical
        let base = if self.excluded.is_empty() {
            self.root.clone()
        } else {
            self.root
                .canonicalize()
                .unwrap_or_else(|_| self.root.clone())
        };
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                !(entry.file_type().is_dir() && self.is_excluded(&base, entry.path()))
            });

        for result in walker {
            match result {
                Ok(entry) => {
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    if !self.matches_extension(entry.path()) {
                        continue;
                    }
                    files.push(entry.into_path());
                }
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }

        log::debug!(
            "Found {} matching files under {}",
            files.len(),
            self.root.display()
        );
        files
    }

    fn matches_extension(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.extensions
                    .iter()
                    .any(|candidate| candidate.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    fn is_excluded(&self, base: &Path, dir: &Path) -> bool {
        if self.excluded.is_empty() {
            return false;
        }
        let resolved = match dir.strip_prefix(&self.root) {
            Ok(relative) if relative.as_os_str().is_empty() => base.to_path_buf(),
            Ok(relative) => base.join(relative),
            Err(_) => dir.to_path_buf(),
        };
        self.excluded.iter().any(|ex| resolved == *ex)
    }
}

/// Basename of `path` as an owned string
pub(crate) fn file_name_of(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
}
