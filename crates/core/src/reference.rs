use crate::identifier::{Identifier, IdentifierExtractor};
use crate::scanner::{file_name_of, TreeScanner};
use crate::{FixerError, Result};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

/// Correct identifiers of one reference tree, keyed by descriptor basename.
///
/// The namespace is flat: `Editor/Icon.png.meta` and `Runtime/Icon.png.meta`
/// share the key `Icon.png.meta` and only the one visited last survives.
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    entries: HashMap<String, Identifier>,
    ambiguous: BTreeSet<String>,
    descriptors_seen: usize,
    duplicates_overridden: usize,
}

impl ReferenceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file_name: impl Into<String>, id: Identifier) {
        let file_name = file_name.into();
        if let Some(previous) = self.entries.insert(file_name.clone(), id) {
            self.duplicates_overridden += 1;
            self.ambiguous.insert(file_name.clone());
            log::debug!("Duplicate descriptor name {file_name}, dropping {previous}");
        }
    }

    pub fn get(&self, file_name: &str) -> Option<&Identifier> {
        self.entries.get(file_name)
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.entries.contains_key(file_name)
    }

    /// More than one descriptor in the tree carried this name
    pub fn is_ambiguous(&self, file_name: &str) -> bool {
        self.ambiguous.contains(file_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Identifier)> {
        self.entries.iter()
    }

    /// Descriptor files visited, including ones without an identifier
    pub fn descriptors_seen(&self) -> usize {
        self.descriptors_seen
    }

    pub fn duplicates_overridden(&self) -> usize {
        self.duplicates_overridden
    }
}

/// Builds a [`ReferenceIndex`] from a correct tree
pub struct ReferenceIndexer<'a> {
    extractor: &'a IdentifierExtractor,
    descriptor_extension: &'a str,
    excluded: Vec<PathBuf>,
}

impl<'a> ReferenceIndexer<'a> {
    pub fn new(extractor: &'a IdentifierExtractor, descriptor_extension: &'a str) -> Self {
        Self {
            extractor,
            descriptor_extension,
            excluded: Vec::new(),
        }
    }

    /// Leave these subtrees out of the index
    pub fn excluding<I>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        self.excluded = roots.into_iter().collect();
        self
    }

    pub fn index(&self, tree_root: &Path) -> Result<ReferenceIndex> {
        if !tree_root.is_dir() {
            return Err(FixerError::InvalidPath(tree_root.to_path_buf()));
        }

        let mut index = ReferenceIndex::new();
        let files = TreeScanner::new(tree_root)
            .with_extensions([self.descriptor_extension])
            .excluding(self.excluded.iter().cloned())
            .scan();

        for path in files {
            index.descriptors_seen += 1;
            let Some(file_name) = file_name_of(&path) else {
                continue;
            };
            let Some(id) = self.extractor.extract_file(&path) else {
                log::debug!("No identifier in {}", path.display());
                continue;
            };
            index.insert(file_name, id);
        }

        log::info!(
            "Indexed {} correct descriptors from {}",
            index.len(),
            tree_root.display()
        );
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn meta(id: &str) -> String {
        format!("fileFormatVersion: 2\nguid: {id}\nMonoImporter:\n  serializedVersion: 2\n")
    }

    #[test]
    fn indexes_descriptors_by_file_name() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("nested")).unwrap();
        fs::write(temp.path().join("A.meta"), meta(&"1".repeat(32))).unwrap();
        fs::write(temp.path().join("nested/B.meta"), meta(&"2".repeat(32))).unwrap();
        fs::write(temp.path().join("readme.txt"), meta(&"3".repeat(32))).unwrap();

        let extractor = IdentifierExtractor::default();
        let index = ReferenceIndexer::new(&extractor, "meta")
            .index(temp.path())
            .unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(index.get("A.meta"), Some(&Identifier::new("1".repeat(32))));
        assert_eq!(index.get("B.meta"), Some(&Identifier::new("2".repeat(32))));
        assert!(!index.contains("readme.txt"));
    }

    #[test]
    fn malformed_descriptors_are_skipped() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("Broken.meta"), "fileFormatVersion: 2\n").unwrap();
        fs::write(temp.path().join("Ok.meta"), meta(&"a".repeat(32))).unwrap();

        let extractor = IdentifierExtractor::default();
        let index = ReferenceIndexer::new(&extractor, "meta")
            .index(temp.path())
            .unwrap();

        assert_eq!(index.len(), 1);
        assert_eq!(index.descriptors_seen(), 2);
    }

    #[test]
    fn duplicate_names_keep_last_visited() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("a")).unwrap();
        fs::create_dir_all(temp.path().join("b")).unwrap();
        fs::write(temp.path().join("a/Icon.png.meta"), meta(&"1".repeat(32))).unwrap();
        fs::write(temp.path().join("b/Icon.png.meta"), meta(&"2".repeat(32))).unwrap();

        let extractor = IdentifierExtractor::default();
        let index = ReferenceIndexer::new(&extractor, "meta")
            .index(temp.path())
            .unwrap();

        assert_eq!(index.len(), 1);
        assert_eq!(index.duplicates_overridden(), 1);
        assert!(index.is_ambiguous("Icon.png.meta"));
        assert_eq!(
            index.get("Icon.png.meta"),
            Some(&Identifier::new("2".repeat(32)))
        );
    }

    #[test]
    fn excluded_subtrees_are_not_indexed() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("Old")).unwrap();
        fs::write(temp.path().join("Old/A.meta"), meta(&"1".repeat(32))).unwrap();
        fs::write(temp.path().join("B.meta"), meta(&"2".repeat(32))).unwrap();

        let extractor = IdentifierExtractor::default();
        let index = ReferenceIndexer::new(&extractor, "meta")
            .excluding([temp.path().join("Old")])
            .index(temp.path())
            .unwrap();

        assert!(!index.contains("A.meta"));
        assert!(index.contains("B.meta"));
        assert!(!index.is_ambiguous("B.meta"));
    }

    #[test]
    fn missing_root_is_an_error() {
        let temp = tempdir().unwrap();
        let extractor = IdentifierExtractor::default();
        let result = ReferenceIndexer::new(&extractor, "meta").index(&temp.path().join("nope"));
        assert!(matches!(result, Err(FixerError::InvalidPath(_))));
    }
}
