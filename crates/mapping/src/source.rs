use crate::delimited::parse_delimited;
use crate::sanitize::sanitize_path;
use crate::structured::parse_mapping_document;
use anyhow::{Context, Result};
use guidfix_core::TreePair;
use std::path::{Path, PathBuf};

/// Ordered tree pairs plus the optional tree to rewrite
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingPlan {
    pub pairs: Vec<TreePair>,
    pub target: Option<PathBuf>,
    /// Tree searched for descriptors a mapped correct folder lacks
    pub source: Option<PathBuf>,
    /// Records dropped while loading
    pub rejected: usize,
}

impl MappingPlan {
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Anything that can produce a [`MappingPlan`]
pub trait MappingSource {
    fn load(&mut self) -> Result<MappingPlan>;
}

/// `incorrect|correct` lines
pub struct DelimitedFile {
    path: PathBuf,
}

impl DelimitedFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl MappingSource for DelimitedFile {
    fn load(&mut self) -> Result<MappingPlan> {
        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("read pairs file {}", self.path.display()))?;
        let plan = parse_delimited(&text);
        log::info!(
            "Loaded {} pairs from {} ({} rejected)",
            plan.pairs.len(),
            self.path.display(),
            plan.rejected
        );
        Ok(plan)
    }
}

/// Saved mapping file with `unity_path` and `mappings`
pub struct StructuredFile {
    path: PathBuf,
}

impl StructuredFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl MappingSource for StructuredFile {
    fn load(&mut self) -> Result<MappingPlan> {
        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("read mapping file {}", self.path.display()))?;
        let parsed = parse_mapping_document(&text)
            .with_context(|| format!("parse mapping file {}", self.path.display()))?;

        let mut plan = MappingPlan {
            pairs: Vec::with_capacity(parsed.pairs.len()),
            target: parsed.unity_path.as_deref().and_then(sanitize_path),
            source: parsed.source_path.as_deref().and_then(sanitize_path),
            rejected: parsed.rejected,
        };
        for (incorrect, correct) in parsed.pairs {
            match (sanitize_path(&incorrect), sanitize_path(&correct)) {
                (Some(incorrect), Some(correct)) => plan.pairs.push(TreePair::new(incorrect, correct)),
                _ => plan.rejected += 1,
            }
        }

        log::info!(
            "Loaded {} mappings from {} ({} rejected)",
            plan.pairs.len(),
            self.path.display(),
            plan.rejected
        );
        Ok(plan)
    }
}
