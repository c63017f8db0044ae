//! Detection of script references that no descriptor in the project backs.
//!
//! Useful when the stale tree is gone: the scan lists every referenced
//! identifier with no owner, and [`ScriptAssignment`]s turn hand-picked
//! replacement scripts into a [`GlobalReplacementMap`] for the rewriter.

use crate::aggregate::GlobalReplacementMap;
use crate::identifier::{Identifier, IdentifierExtractor};
use crate::scanner::{file_name_of, TreeScanner};
use crate::{FixerError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

const SCRIPT_REFERENCE: &str =
    r"m_Script: \{fileID: 11500000, guid: ([a-fA-F0-9]{32}), type: 3\}";
const REFERENCING_EXTENSIONS: &[&str] = &["unity", "prefab", "asset"];
const MAX_EXAMPLES: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingReference {
    pub id: Identifier,
    pub occurrences: usize,
    /// File name of each of the first occurrences, repeats included
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MissingScriptReport {
    pub known_identifiers: usize,
    pub files_scanned: usize,
    pub missing: Vec<MissingReference>,
}

/// A missing identifier and the script that should own its references
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptAssignment {
    pub missing: Identifier,
    /// The script itself or its descriptor
    pub script: PathBuf,
}

impl ScriptAssignment {
    pub fn new(missing: impl Into<Identifier>, script: impl Into<PathBuf>) -> Self {
        Self {
            missing: missing.into(),
            script: script.into(),
        }
    }
}

pub struct MissingScriptScanner<'a> {
    extractor: &'a IdentifierExtractor,
    descriptor_extension: &'a str,
    pattern: Regex,
}

impl<'a> MissingScriptScanner<'a> {
    pub fn new(extractor: &'a IdentifierExtractor, descriptor_extension: &'a str) -> Result<Self> {
        Ok(Self {
            extractor,
            descriptor_extension,
            pattern: Regex::new(SCRIPT_REFERENCE)?,
        })
    }

    pub fn scan(&self, project_root: &Path) -> Result<MissingScriptReport> {
        if !project_root.is_dir() {
            return Err(FixerError::InvalidPath(project_root.to_path_buf()));
        }

        let known: HashSet<Identifier> = TreeScanner::new(project_root)
            .with_extensions([self.descriptor_extension])
            .scan()
            .iter()
            .filter_map(|path| self.extractor.extract_file(path))
            .collect();
        log::info!("Indexed {} valid identifiers", known.len());

        let mut report = MissingScriptReport {
            known_identifiers: known.len(),
            ..MissingScriptReport::default()
        };
        let mut by_id: HashMap<Identifier, MissingReference> = HashMap::new();

        for path in TreeScanner::new(project_root)
            .with_extensions(REFERENCING_EXTENSIONS)
            .scan()
        {
            report.files_scanned += 1;
            let content = match fs::read(&path) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(err) => {
                    log::warn!("Skipping {}: {err}", path.display());
                    continue;
                }
            };
            let file_name = file_name_of(&path).unwrap_or_default();

            for captures in self.pattern.captures_iter(&content) {
                let id = Identifier::new(&captures[1]);
                if known.contains(&id) {
                    continue;
                }
                let entry = by_id
                    .entry(id.clone())
                    .or_insert_with(|| MissingReference {
                        id,
                        occurrences: 0,
                        examples: Vec::new(),
                    });
                entry.occurrences += 1;
                if entry.examples.len() < MAX_EXAMPLES {
                    entry.examples.push(file_name.clone());
                }
            }
        }

        let mut missing: Vec<MissingReference> = by_id.into_values().collect();
        missing.sort_by(|a, b| {
            b.occurrences
                .cmp(&a.occurrences)
                .then_with(|| a.id.cmp(&b.id))
        });
        log::info!(
            "Found {} missing script identifiers in {} files",
            missing.len(),
            report.files_scanned
        );
        report.missing = missing;
        Ok(report)
    }

    /// Map each missing identifier to the identifier in its chosen script's
    /// descriptor. A later assignment for the same identifier wins.
    pub fn resolve(&self, assignments: &[ScriptAssignment]) -> Result<GlobalReplacementMap> {
        let mut map = GlobalReplacementMap::new();
        for assignment in assignments {
            let descriptor = self.descriptor_of(&assignment.script);
            if !descriptor.is_file() {
                return Err(FixerError::InvalidPath(descriptor));
            }
            let new = self
                .extractor
                .extract_file(&descriptor)
                .ok_or_else(|| FixerError::MissingIdentifier(descriptor.clone()))?;

            if new == assignment.missing {
                log::debug!("{} already owns {new}", descriptor.display());
                continue;
            }
            log::info!(
                "Assigned: {} -> {} ({new})",
                assignment.missing,
                assignment.script.display()
            );
            map.insert(assignment.missing.clone(), new);
        }
        Ok(map)
    }

    fn descriptor_of(&self, script: &Path) -> PathBuf {
        let is_descriptor = script
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(self.descriptor_extension));
        if is_descriptor {
            return script.to_path_buf();
        }
        let mut name = OsString::from(script.as_os_str());
        name.push(".");
        name.push(self.descriptor_extension);
        PathBuf::from(name)
    }
}
