use crate::identifier::{Identifier, IdentifierExtractor};
use crate::reference::ReferenceIndex;
use crate::scanner::{file_name_of, TreeScanner};
use crate::{FixerError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One stale identifier and the identifier it should become
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementPair {
    /// Descriptor basename both trees share
    pub file_name: String,
    pub old: Identifier,
    pub new: Identifier,
    /// The new identifier came from the fallback tree
    #[serde(default)]
    pub via_fallback: bool,
}

/// Compares an incorrect tree against a [`ReferenceIndex`]
pub struct MismatchDetector<'a> {
    extractor: &'a IdentifierExtractor,
    descriptor_extension: &'a str,
    fallback: Option<&'a ReferenceIndex>,
}

impl<'a> MismatchDetector<'a> {
    pub fn new(extractor: &'a IdentifierExtractor, descriptor_extension: &'a str) -> Self {
        Self {
            extractor,
            descriptor_extension,
            fallback: None,
        }
    }

    /// Consult `fallback` for names the mapped index does not know
    pub fn with_fallback(mut self, fallback: &'a ReferenceIndex) -> Self {
        self.fallback = Some(fallback);
        self
    }

    fn lookup<'r>(
        &'r self,
        reference: &'r ReferenceIndex,
        file_name: &str,
    ) -> Option<(&'r Identifier, bool)> {
        if let Some(id) = reference.get(file_name) {
            return Some((id, false));
        }
        let fallback = self.fallback?;
        let id = fallback.get(file_name)?;
        if fallback.is_ambiguous(file_name) {
            log::warn!("Multiple fallback candidates for {file_name}, using {id}");
        }
        Some((id, true))
    }

    /// Emit a pair for every descriptor whose identifier differs from the
    /// indexed one. Names missing from the index are not an error: the
    /// correct tree may only hold a subset of the assets.
    pub fn detect(
        &self,
        incorrect_root: &Path,
        reference: &ReferenceIndex,
    ) -> Result<Vec<ReplacementPair>> {
        if !incorrect_root.is_dir() {
            return Err(FixerError::InvalidPath(incorrect_root.to_path_buf()));
        }

        let mut pairs = Vec::new();
        let files = TreeScanner::new(incorrect_root)
            .with_extensions([self.descriptor_extension])
            .scan();

        for path in files {
            let Some(file_name) = file_name_of(&path) else {
                continue;
            };
            let Some((correct, via_fallback)) = self.lookup(reference, &file_name) else {
                continue;
            };
            let Some(current) = self.extractor.extract_file(&path) else {
                log::debug!("No identifier in {}", path.display());
                continue;
            };

            if current == *correct {
                log::debug!("{file_name} already carries {current}");
                continue;
            }

            if via_fallback {
                log::info!("Found match in fallback: {file_name} ({current} -> {correct})");
            } else {
                log::info!("Found match: {file_name} ({current} -> {correct})");
            }
            pairs.push(ReplacementPair {
                file_name,
                old: current,
                new: correct.clone(),
                via_fallback,
            });
        }

        Ok(pairs)
    }
}
