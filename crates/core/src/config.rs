use crate::identifier::{
    ExtractStrategy, IdentifierExtractor, DEFAULT_IDENTIFIER_LEN, DEFAULT_MARKER, DEFAULT_OFFSET,
};
use crate::{FixerError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for the index / diff / rewrite pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FixerConfig {
    /// Extension of descriptor files carrying identifiers (without the dot)
    pub descriptor_extension: String,

    /// How identifiers are located inside descriptor files
    pub extraction: ExtractionConfig,

    /// Extensions eligible for rewriting in the target tree
    pub rewrite_extensions: Vec<String>,

    /// Extensions expected to be YAML text; anything else is flagged as binary
    pub text_asset_extensions: Vec<String>,

    /// Resolution of one old identifier mapped to different new identifiers
    pub collision_policy: CollisionPolicy,

    /// How modified target files are written back
    pub write_mode: WriteMode,
}

impl Default for FixerConfig {
    fn default() -> Self {
        Self {
            descriptor_extension: "meta".to_string(),
            extraction: ExtractionConfig::default(),
            rewrite_extensions: ["unity", "prefab", "mat", "asset", "meta", "anim"]
                .into_iter()
                .map(String::from)
                .collect(),
            text_asset_extensions: ["unity", "prefab", "asset", "mat", "controller", "anim"]
                .into_iter()
                .map(String::from)
                .collect(),
            collision_policy: CollisionPolicy::LastWriteWins,
            write_mode: WriteMode::Direct,
        }
    }
}

impl FixerConfig {
    /// Load a config file. JSON is tried first, TOML second.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let mut config = Self::parse(&bytes)?;
        config.normalize();
        config.validate()?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    fn parse(bytes: &[u8]) -> Result<Self> {
        match serde_json::from_slice::<Self>(bytes) {
            Ok(config) => Ok(config),
            Err(json_err) => {
                let utf8 = std::str::from_utf8(bytes)
                    .map_err(|err| FixerError::invalid_config(format!("{json_err}; {err}")))?;
                toml::from_str(utf8).map_err(|toml_err| {
                    FixerError::invalid_config(format!(
                        "config is not valid JSON ({json_err}) or TOML ({toml_err})"
                    ))
                })
            }
        }
    }

    /// Strip leading dots and lower-case every extension
    pub fn normalize(&mut self) {
        self.descriptor_extension = normalize_extension(&self.descriptor_extension);
        for ext in self
            .rewrite_extensions
            .iter_mut()
            .chain(self.text_asset_extensions.iter_mut())
        {
            *ext = normalize_extension(ext);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.descriptor_extension.is_empty() {
            return Err(FixerError::invalid_config(
                "descriptor_extension must not be empty",
            ));
        }
        if self.rewrite_extensions.is_empty() {
            return Err(FixerError::invalid_config(
                "rewrite_extensions must list at least one extension",
            ));
        }
        if self.rewrite_extensions.iter().any(|ext| ext.is_empty()) {
            return Err(FixerError::invalid_config(
                "rewrite_extensions contains an empty extension",
            ));
        }
        self.extraction.validate()
    }

    pub fn extractor(&self) -> IdentifierExtractor {
        self.extraction.extractor()
    }
}

/// `[extraction]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractionConfig {
    pub strategy: StrategyKind,
    pub marker: String,
    pub offset: usize,
    pub identifier_len: usize,
    pub min_content_len: Option<usize>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Marker,
            marker: DEFAULT_MARKER.to_string(),
            offset: DEFAULT_OFFSET,
            identifier_len: DEFAULT_IDENTIFIER_LEN,
            min_content_len: None,
        }
    }
}

impl ExtractionConfig {
    fn strategy(&self) -> ExtractStrategy {
        match self.strategy {
            StrategyKind::Marker => ExtractStrategy::Marker {
                marker: self.marker.clone(),
            },
            StrategyKind::Offset => ExtractStrategy::Offset {
                offset: self.offset,
            },
        }
    }

    pub fn extractor(&self) -> IdentifierExtractor {
        let extractor = IdentifierExtractor::new(self.strategy(), self.identifier_len);
        match self.min_content_len {
            Some(min) => extractor.with_min_content_len(min),
            None => extractor,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.identifier_len == 0 {
            return Err(FixerError::invalid_config("identifier_len must be > 0"));
        }
        if self.strategy == StrategyKind::Marker && self.marker.is_empty() {
            return Err(FixerError::invalid_config(
                "marker must not be empty for the marker strategy",
            ));
        }
        if let Some(min) = self.min_content_len {
            let needed = match self.strategy {
                StrategyKind::Marker => self.marker.len() + self.identifier_len,
                StrategyKind::Offset => self.offset + self.identifier_len,
            };
            if min < needed {
                return Err(FixerError::invalid_config(format!(
                    "min_content_len ({min}) is below the {needed} bytes the strategy reads"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Marker,
    Offset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Later tree pairs silently override earlier ones
    #[default]
    LastWriteWins,

    /// Abort aggregation on a conflicting remap
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Truncate and write in place
    #[default]
    Direct,

    /// Write a temporary sibling, then rename over the original
    Atomic,
}

pub(crate) fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn default_config_valid() {
        let config = FixerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.extractor().min_content_len(), 38);
    }

    #[test]
    fn loads_toml_with_partial_tables() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("guidfix.toml");
        fs::write(
            &path,
            r#"
rewrite_extensions = [".Unity", "prefab", "controller"]
collision_policy = "reject"
write_mode = "atomic"

[extraction]
strategy = "offset"
"#,
        )
        .unwrap();

        let config = FixerConfig::load(&path).unwrap();
        assert_eq!(
            config.rewrite_extensions,
            vec!["unity".to_string(), "prefab".to_string(), "controller".to_string()]
        );
        assert_eq!(config.collision_policy, CollisionPolicy::Reject);
        assert_eq!(config.write_mode, WriteMode::Atomic);
        assert_eq!(config.extraction.strategy, StrategyKind::Offset);
        assert_eq!(config.extractor().min_content_len(), 60);
        assert_eq!(config.descriptor_extension, "meta");
    }

    #[test]
    fn loads_json() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("guidfix.json");
        fs::write(&path, r#"{"descriptor_extension": ".META"}"#).unwrap();

        let config = FixerConfig::load(&path).unwrap();
        assert_eq!(config.descriptor_extension, "meta");
    }

    #[test]
    fn rejects_unknown_keys() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("guidfix.toml");
        fs::write(&path, "rewrite_extentions = [\"unity\"]\n").unwrap();

        assert!(matches!(
            FixerConfig::load(&path),
            Err(FixerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_config_validation() {
        let mut config = FixerConfig::default();

        config.rewrite_extensions.clear();
        assert!(config.validate().is_err());

        config = FixerConfig::default();
        config.extraction.identifier_len = 0;
        assert!(config.validate().is_err());

        config = FixerConfig::default();
        config.extraction.marker.clear();
        assert!(config.validate().is_err());

        config = FixerConfig::default();
        config.extraction.min_content_len = Some(10);
        assert!(config.validate().is_err());

        config.extraction.min_content_len = Some(64);
        assert!(config.validate().is_ok());
        assert_eq!(config.extractor().min_content_len(), 64);
    }
}
