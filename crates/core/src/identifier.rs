use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::path::Path;

/// Opaque asset identifier copied verbatim out of a descriptor file.
///
/// The token is never interpreted; equality is exact string equality.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Identifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Where the identifier lives inside a descriptor file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractStrategy {
    /// Identifier immediately follows the first occurrence of `marker`
    Marker { marker: String },

    /// Identifier starts at a fixed byte offset
    Offset { offset: usize },
}

/// Pulls a fixed-length identifier out of descriptor content.
#[derive(Debug, Clone)]
pub struct IdentifierExtractor {
    strategy: ExtractStrategy,
    identifier_len: usize,
    min_content_len: usize,
}

impl IdentifierExtractor {
    pub fn new(strategy: ExtractStrategy, identifier_len: usize) -> Self {
        let min_content_len = Self::default_min_len(&strategy, identifier_len);
        Self {
            strategy,
            identifier_len,
            min_content_len,
        }
    }

    /// `guid: ` marker followed by a 32 character token
    pub fn marker(marker: impl Into<String>) -> Self {
        Self::new(
            ExtractStrategy::Marker {
                marker: marker.into(),
            },
            DEFAULT_IDENTIFIER_LEN,
        )
    }

    /// Fixed offset layout (`fileFormatVersion: 2\nguid: ` is 27 bytes)
    pub fn offset(offset: usize) -> Self {
        Self::new(ExtractStrategy::Offset { offset }, DEFAULT_IDENTIFIER_LEN)
    }

    pub fn with_min_content_len(mut self, min_content_len: usize) -> Self {
        self.min_content_len = min_content_len;
        self
    }

    pub fn strategy(&self) -> &ExtractStrategy {
        &self.strategy
    }

    pub fn identifier_len(&self) -> usize {
        self.identifier_len
    }

    pub fn min_content_len(&self) -> usize {
        self.min_content_len
    }

    pub(crate) fn default_min_len(strategy: &ExtractStrategy, identifier_len: usize) -> usize {
        match strategy {
            ExtractStrategy::Marker { marker } => marker.len() + identifier_len,
            // trailing newline after the token
            ExtractStrategy::Offset { offset } => offset + identifier_len + 1,
        }
    }

    /// Extract the identifier, or `None` when the content does not carry one.
    pub fn extract(&self, content: &str) -> Option<Identifier> {
        if content.chars().count() < self.min_content_len {
            return None;
        }

        match &self.strategy {
            ExtractStrategy::Marker { marker } => {
                let start = content.find(marker.as_str())? + marker.len();
                let token: String = content[start..].chars().take(self.identifier_len).collect();
                if token.chars().count() < self.identifier_len {
                    return None;
                }
                Some(Identifier(token))
            }
            ExtractStrategy::Offset { offset } => {
                let end = offset.checked_add(self.identifier_len)?;
                content.get(*offset..end).map(Identifier::new)
            }
        }
    }

    /// Read `path` and extract from its content. Unreadable or non UTF-8
    /// files count as carrying no identifier.
    pub fn extract_file(&self, path: &Path) -> Option<Identifier> {
        match std::fs::read_to_string(path) {
            Ok(content) => self.extract(&content),
            Err(err) => {
                log::debug!("Cannot read descriptor {}: {err}", path.display());
                None
            }
        }
    }
}

impl Default for IdentifierExtractor {
    fn default() -> Self {
        Self::marker(DEFAULT_MARKER)
    }
}

pub const DEFAULT_MARKER: &str = "guid: ";
pub const DEFAULT_OFFSET: usize = 27;
pub const DEFAULT_IDENTIFIER_LEN: usize = 32;

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const META: &str = "fileFormatVersion: 2\nguid: 0123456789abcdef0123456789abcdef\nMonoImporter:\n";

    #[test]
    fn extracts_token_after_marker() {
        let extractor = IdentifierExtractor::default();
        assert_eq!(
            extractor.extract(META),
            Some(Identifier::new("0123456789abcdef0123456789abcdef"))
        );
    }

    #[test]
    fn offset_strategy_matches_classic_layout() {
        let extractor = IdentifierExtractor::offset(DEFAULT_OFFSET);
        assert_eq!(extractor.min_content_len(), 60);
        assert_eq!(
            extractor.extract(META),
            Some(Identifier::new("0123456789abcdef0123456789abcdef"))
        );
    }

    #[test]
    fn offset_strategy_rejects_short_content() {
        let extractor = IdentifierExtractor::offset(DEFAULT_OFFSET);
        let short = "fileFormatVersion: 2\nguid: 0123456789abcdef0123456789abcdef";
        assert_eq!(extractor.extract(short), None);
    }

    #[test]
    fn missing_marker_is_not_found() {
        let extractor = IdentifierExtractor::default();
        let content = "fileFormatVersion: 2\nfolderAsset: yes\nDefaultImporter:\n  userData:\n";
        assert_eq!(extractor.extract(content), None);
    }

    #[test]
    fn truncated_token_is_not_found() {
        let extractor = IdentifierExtractor::default().with_min_content_len(0);
        assert_eq!(extractor.extract("guid: 0123456789"), None);
    }

    #[test]
    fn token_is_not_validated() {
        let extractor = IdentifierExtractor::default();
        let content = "guid: ZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZ-rest";
        assert_eq!(
            extractor.extract(content).map(|id| id.to_string()),
            Some("Z".repeat(32))
        );
    }

    #[test]
    fn unreadable_file_is_not_found() {
        let temp = tempfile::tempdir().unwrap();
        let extractor = IdentifierExtractor::default();
        assert_eq!(extractor.extract_file(&temp.path().join("absent.meta")), None);
    }

    proptest! {
        #[test]
        fn proptest_returns_exact_chars_after_marker(
            prefix in "[a-zA-Z0-9 \\n:]{0,40}",
            token in "[a-f0-9]{32}",
            suffix in "[a-zA-Z0-9 \\n]{0,40}",
        ) {
            prop_assume!(!prefix.contains("guid: "));
            let content = format!("{prefix}guid: {token}{suffix}");
            let extractor = IdentifierExtractor::default();
            prop_assert_eq!(extractor.extract(&content), Some(Identifier::new(token)));
        }

        #[test]
        fn proptest_short_content_is_not_found(content in "[a-z: ]{0,37}") {
            let extractor = IdentifierExtractor::default();
            prop_assert_eq!(extractor.extract(&content), None);
        }
    }
}
