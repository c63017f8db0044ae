use crate::aggregate::{AggregateReport, MappingAggregator, TreePair};
use crate::config::FixerConfig;
use crate::identifier::IdentifierExtractor;
use crate::missing::{MissingScriptReport, MissingScriptScanner, ScriptAssignment};
use crate::rewrite::{BulkRewriter, RewriteOptions, RewriteReport};
use crate::{GlobalReplacementMap, Result};
use std::path::Path;

/// Config-driven entry point tying the pipeline phases together
pub struct GuidFixer {
    config: FixerConfig,
    extractor: IdentifierExtractor,
}

impl GuidFixer {
    pub fn new(config: FixerConfig) -> Result<Self> {
        config.validate()?;
        let extractor = config.extractor();
        Ok(Self { config, extractor })
    }

    pub fn config(&self) -> &FixerConfig {
        &self.config
    }

    pub fn extractor(&self) -> &IdentifierExtractor {
        &self.extractor
    }

    pub fn aggregate(&self, pairs: &[TreePair]) -> Result<AggregateReport> {
        self.aggregate_with_fallback(pairs, None)
    }

    /// Like [`GuidFixer::aggregate`], but descriptors a correct tree lacks
    /// are looked up under `fallback_root` too.
    pub fn aggregate_with_fallback(
        &self,
        pairs: &[TreePair],
        fallback_root: Option<&Path>,
    ) -> Result<AggregateReport> {
        let mut aggregator = MappingAggregator::new(
            &self.extractor,
            &self.config.descriptor_extension,
            self.config.collision_policy,
        );
        if let Some(root) = fallback_root {
            aggregator = aggregator.with_fallback_root(root);
        }
        aggregator.aggregate(pairs)
    }

    /// Rewrite options seeded from the config; callers add exclusions or
    /// dry-run before passing them to [`GuidFixer::rewrite`].
    pub fn rewrite_options(&self) -> RewriteOptions {
        RewriteOptions::from_config(&self.config)
    }

    pub fn rewrite(
        &self,
        target_root: &Path,
        map: &GlobalReplacementMap,
        options: RewriteOptions,
    ) -> Result<RewriteReport> {
        BulkRewriter::new(options).rewrite(target_root, map)
    }

    pub fn scan_missing_scripts(&self, project_root: &Path) -> Result<MissingScriptReport> {
        MissingScriptScanner::new(&self.extractor, &self.config.descriptor_extension)?
            .scan(project_root)
    }

    pub fn resolve_script_assignments(
        &self,
        assignments: &[ScriptAssignment],
    ) -> Result<GlobalReplacementMap> {
        MissingScriptScanner::new(&self.extractor, &self.config.descriptor_extension)?
            .resolve(assignments)
    }
}
