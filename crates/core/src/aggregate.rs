use crate::config::CollisionPolicy;
use crate::identifier::{Identifier, IdentifierExtractor};
use crate::mismatch::{MismatchDetector, ReplacementPair};
use crate::reference::{ReferenceIndex, ReferenceIndexer};
use crate::{FixerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// An incorrect tree and the correct tree it should be diffed against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreePair {
    pub incorrect: PathBuf,
    pub correct: PathBuf,
}

impl TreePair {
    pub fn new(incorrect: impl Into<PathBuf>, correct: impl Into<PathBuf>) -> Self {
        Self {
            incorrect: incorrect.into(),
            correct: correct.into(),
        }
    }
}

/// Old → new identifiers merged across every processed tree pair
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlobalReplacementMap {
    entries: BTreeMap<Identifier, Identifier>,
}

impl GlobalReplacementMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert and return the replaced value when the key already mapped
    /// somewhere else.
    pub fn insert(&mut self, old: Identifier, new: Identifier) -> Option<Identifier> {
        match self.entries.insert(old, new.clone()) {
            Some(previous) if previous != new => Some(previous),
            _ => None,
        }
    }

    pub fn get(&self, old: &Identifier) -> Option<&Identifier> {
        self.entries.get(old)
    }

    /// Stored `(old, new)` entry for a raw token as it appears in a file
    pub fn entry_for(&self, token: &str) -> Option<(&Identifier, &Identifier)> {
        self.entries.get_key_value(token)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Identifier, &Identifier)> {
        self.entries.iter()
    }
}

impl FromIterator<(Identifier, Identifier)> for GlobalReplacementMap {
    fn from_iter<T: IntoIterator<Item = (Identifier, Identifier)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (old, new) in iter {
            map.insert(old, new);
        }
        map
    }
}

/// Result of one tree pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PairOutcome {
    Skipped {
        pair: TreePair,
        missing: Vec<PathBuf>,
    },
    Processed {
        pair: TreePair,
        indexed: usize,
        replacements: Vec<ReplacementPair>,
    },
}

/// A remap that overrode an earlier, different remap of the same identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collision {
    pub old: Identifier,
    pub previous: Identifier,
    pub incoming: Identifier,
    pub pair_index: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateReport {
    pub map: GlobalReplacementMap,
    pub outcomes: Vec<PairOutcome>,
    pub collisions: Vec<Collision>,
    /// Descriptors indexed from the fallback tree, if one was searched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_indexed: Option<usize>,
}

impl AggregateReport {
    pub fn processed_pairs(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome, PairOutcome::Processed { .. }))
            .count()
    }

    pub fn skipped_pairs(&self) -> usize {
        self.outcomes.len() - self.processed_pairs()
    }
}

/// Runs index + detect for each tree pair and merges the results
pub struct MappingAggregator<'a> {
    extractor: &'a IdentifierExtractor,
    descriptor_extension: &'a str,
    policy: CollisionPolicy,
    fallback_root: Option<&'a Path>,
}

impl<'a> MappingAggregator<'a> {
    pub fn new(
        extractor: &'a IdentifierExtractor,
        descriptor_extension: &'a str,
        policy: CollisionPolicy,
    ) -> Self {
        Self {
            extractor,
            descriptor_extension,
            policy,
            fallback_root: None,
        }
    }

    /// Search `root` for descriptors a pair's correct tree lacks. The
    /// incorrect trees of every pair are left out of that search.
    pub fn with_fallback_root(mut self, root: &'a Path) -> Self {
        self.fallback_root = Some(root);
        self
    }

    fn fallback_index(&self, pairs: &[TreePair]) -> Result<Option<ReferenceIndex>> {
        let Some(root) = self.fallback_root else {
            return Ok(None);
        };
        if !root.is_dir() {
            log::warn!("Fallback root missing, ignoring: {}", root.display());
            return Ok(None);
        }
        log::info!("Indexing fallback root {}", root.display());
        let index = ReferenceIndexer::new(self.extractor, self.descriptor_extension)
            .excluding(pairs.iter().map(|pair| pair.incorrect.clone()))
            .index(root)?;
        Ok(Some(index))
    }

    pub fn aggregate(&self, pairs: &[TreePair]) -> Result<AggregateReport> {
        let indexer = ReferenceIndexer::new(self.extractor, self.descriptor_extension);
        let fallback = self.fallback_index(pairs)?;
        let mut detector = MismatchDetector::new(self.extractor, self.descriptor_extension);
        if let Some(fallback) = &fallback {
            detector = detector.with_fallback(fallback);
        }
        let mut report = AggregateReport {
            fallback_indexed: fallback.as_ref().map(ReferenceIndex::len),
            ..AggregateReport::default()
        };

        for (pair_index, pair) in pairs.iter().enumerate() {
            log::info!(
                "[{}/{}] {} -> {}",
                pair_index + 1,
                pairs.len(),
                pair.incorrect.display(),
                pair.correct.display()
            );

            let missing: Vec<PathBuf> = [&pair.incorrect, &pair.correct]
                .into_iter()
                .filter(|root| !root.is_dir())
                .cloned()
                .collect();
            if !missing.is_empty() {
                for root in &missing {
                    log::warn!("Skipped pair: path missing {}", root.display());
                }
                report.outcomes.push(PairOutcome::Skipped {
                    pair: pair.clone(),
                    missing,
                });
                continue;
            }

            let index = indexer.index(&pair.correct)?;
            let replacements = detector.detect(&pair.incorrect, &index)?;

            for replacement in &replacements {
                let incoming = replacement.new.clone();
                let Some(previous) = report
                    .map
                    .insert(replacement.old.clone(), incoming.clone())
                else {
                    continue;
                };

                if self.policy == CollisionPolicy::Reject {
                    return Err(FixerError::Collision {
                        old: replacement.old.clone(),
                        previous,
                        incoming,
                    });
                }
                log::warn!(
                    "{} was mapped to {previous}, now {incoming} ({})",
                    replacement.old,
                    replacement.file_name
                );
                report.collisions.push(Collision {
                    old: replacement.old.clone(),
                    previous,
                    incoming,
                    pair_index,
                });
            }

            log::info!(
                "Pair {}: {} replacements from {} indexed descriptors",
                pair_index + 1,
                replacements.len(),
                index.len()
            );
            report.outcomes.push(PairOutcome::Processed {
                pair: pair.clone(),
                indexed: index.len(),
                replacements,
            });
        }

        log::info!(
            "Replacement map built: {} identifiers from {} pairs ({} skipped)",
            report.map.len(),
            report.processed_pairs(),
            report.skipped_pairs()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn write_meta(dir: &Path, name: &str, id: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(
            dir.join(name),
            format!("fileFormatVersion: 2\nguid: {id}\nMonoImporter:\n"),
        )
        .unwrap();
    }

    fn id(c: char) -> Identifier {
        Identifier::new(c.to_string().repeat(32))
    }

    #[test]
    fn later_pairs_override_earlier_ones() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        write_meta(&root.join("old1"), "X.meta", &"a".repeat(32));
        write_meta(&root.join("new1"), "X.meta", &"b".repeat(32));
        write_meta(&root.join("old2"), "Y.meta", &"a".repeat(32));
        write_meta(&root.join("new2"), "Y.meta", &"c".repeat(32));

        let extractor = IdentifierExtractor::default();
        let report = MappingAggregator::new(&extractor, "meta", CollisionPolicy::LastWriteWins)
            .aggregate(&[
                TreePair::new(root.join("old1"), root.join("new1")),
                TreePair::new(root.join("old2"), root.join("new2")),
            ])
            .unwrap();

        assert_eq!(report.map.len(), 1);
        assert_eq!(report.map.get(&id('a')), Some(&id('c')));
        assert_eq!(
            report.collisions,
            vec![Collision {
                old: id('a'),
                previous: id('b'),
                incoming: id('c'),
                pair_index: 1,
            }]
        );
    }

    #[test]
    fn reject_policy_fails_on_conflicting_remap() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        write_meta(&root.join("old1"), "X.meta", &"a".repeat(32));
        write_meta(&root.join("new1"), "X.meta", &"b".repeat(32));
        write_meta(&root.join("old2"), "X.meta", &"a".repeat(32));
        write_meta(&root.join("new2"), "X.meta", &"c".repeat(32));

        let extractor = IdentifierExtractor::default();
        let result = MappingAggregator::new(&extractor, "meta", CollisionPolicy::Reject).aggregate(
            &[
                TreePair::new(root.join("old1"), root.join("new1")),
                TreePair::new(root.join("old2"), root.join("new2")),
            ],
        );

        assert!(matches!(result, Err(FixerError::Collision { .. })));
    }

    #[test]
    fn identical_remaps_are_not_collisions() {
        let mut map = GlobalReplacementMap::new();
        assert_eq!(map.insert(id('a'), id('b')), None);
        assert_eq!(map.insert(id('a'), id('b')), None);
        assert_eq!(map.insert(id('a'), id('c')), Some(id('b')));
    }

    #[test]
    fn missing_roots_skip_only_that_pair() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        write_meta(&root.join("old"), "X.meta", &"a".repeat(32));
        write_meta(&root.join("new"), "X.meta", &"b".repeat(32));

        let extractor = IdentifierExtractor::default();
        let report = MappingAggregator::new(&extractor, "meta", CollisionPolicy::LastWriteWins)
            .aggregate(&[
                TreePair::new(root.join("gone"), root.join("new")),
                TreePair::new(root.join("old"), root.join("new")),
            ])
            .unwrap();

        assert_eq!(report.skipped_pairs(), 1);
        assert_eq!(report.processed_pairs(), 1);
        assert_eq!(report.map.get(&id('a')), Some(&id('b')));
        match &report.outcomes[0] {
            PairOutcome::Skipped { missing, .. } => {
                assert_eq!(missing, &vec![root.join("gone")]);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn fallback_root_supplies_descriptors_outside_the_mapped_tree() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        let project = root.join("Project");
        write_meta(&project.join("Old"), "Moved.cs.meta", &"a".repeat(32));
        write_meta(&project.join("Old"), "Kept.cs.meta", &"d".repeat(32));
        write_meta(&project.join("New"), "Kept.cs.meta", &"e".repeat(32));
        write_meta(&project.join("Cache/Other"), "Moved.cs.meta", &"b".repeat(32));

        let extractor = IdentifierExtractor::default();
        let report = MappingAggregator::new(&extractor, "meta", CollisionPolicy::LastWriteWins)
            .with_fallback_root(&project)
            .aggregate(&[TreePair::new(project.join("Old"), project.join("New"))])
            .unwrap();

        assert_eq!(report.map.get(&id('a')), Some(&id('b')));
        assert_eq!(report.map.get(&id('d')), Some(&id('e')));
        // Old is excluded; New and Cache hold one descriptor each
        assert_eq!(report.fallback_indexed, Some(2));
        match &report.outcomes[0] {
            PairOutcome::Processed { replacements, .. } => {
                let via: Vec<_> = replacements
                    .iter()
                    .map(|r| (r.file_name.as_str(), r.via_fallback))
                    .collect();
                assert_eq!(via, vec![("Kept.cs.meta", false), ("Moved.cs.meta", true)]);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn missing_fallback_root_is_ignored() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        write_meta(&root.join("old"), "X.meta", &"a".repeat(32));
        write_meta(&root.join("new"), "X.meta", &"b".repeat(32));

        let extractor = IdentifierExtractor::default();
        let gone = root.join("gone");
        let report = MappingAggregator::new(&extractor, "meta", CollisionPolicy::LastWriteWins)
            .with_fallback_root(&gone)
            .aggregate(&[TreePair::new(root.join("old"), root.join("new"))])
            .unwrap();

        assert_eq!(report.fallback_indexed, None);
        assert_eq!(report.map.get(&id('a')), Some(&id('b')));
    }
}
