use crate::aggregate::GlobalReplacementMap;
use crate::config::{normalize_extension, FixerConfig, WriteMode};
use crate::scanner::TreeScanner;
use crate::identifier::Identifier;
use crate::{FixerError, Result};
use regex::{Captures, Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

const YAML_HEADER: &str = "%YAML";
const UTF8_BOM: char = '\u{feff}';
const PATTERN_SIZE_LIMIT: usize = 64 << 20;

/// Options for a rewrite pass over a target tree
#[derive(Debug, Clone)]
pub struct RewriteOptions {
    /// Only files with these extensions are opened
    pub extensions: Vec<String>,

    /// Extensions expected to hold YAML text
    pub text_asset_extensions: Vec<String>,

    /// Directories pruned from the walk
    pub excluded: Vec<PathBuf>,

    pub write_mode: WriteMode,

    /// Compute the report without touching any file
    pub dry_run: bool,
}

impl RewriteOptions {
    pub fn from_config(config: &FixerConfig) -> Self {
        Self {
            extensions: config.rewrite_extensions.clone(),
            text_asset_extensions: config.text_asset_extensions.clone(),
            excluded: Vec::new(),
            write_mode: config.write_mode,
            dry_run: false,
        }
    }
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self::from_config(&FixerConfig::default())
    }
}

/// A candidate file the rewriter had to leave alone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Statistics about a rewrite pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RewriteReport {
    /// Candidate files read (allow-listed extension)
    pub files_scanned: usize,

    /// Files whose content changed
    pub files_modified: usize,

    /// (file, map entry) pairs with at least one substitution
    pub replacement_count: usize,

    pub modified: Vec<PathBuf>,
    pub skipped: Vec<SkippedFile>,

    /// Text-serialized asset types that do not look like YAML
    pub binary_suspects: Vec<PathBuf>,

    pub dry_run: bool,
}

impl RewriteReport {
    fn skip(&mut self, path: &Path, reason: impl Into<String>) {
        let reason = reason.into();
        log::warn!("Skipping {}: {reason}", path.display());
        self.skipped.push(SkippedFile {
            path: path.to_path_buf(),
            reason,
        });
    }
}

/// Applies a [`GlobalReplacementMap`] to every allow-listed file of a tree
pub struct BulkRewriter {
    options: RewriteOptions,
}

impl BulkRewriter {
    pub fn new(options: RewriteOptions) -> Self {
        Self { options }
    }

    pub fn rewrite(&self, target_root: &Path, map: &GlobalReplacementMap) -> Result<RewriteReport> {
        if !target_root.is_dir() {
            return Err(FixerError::InvalidPath(target_root.to_path_buf()));
        }

        let mut report = RewriteReport {
            dry_run: self.options.dry_run,
            ..RewriteReport::default()
        };
        let pattern = token_pattern(map)?;

        let files = TreeScanner::new(target_root)
            .with_extensions(&self.options.extensions)
            .excluding(self.options.excluded.iter().cloned())
            .scan();

        log::info!(
            "Rewriting {} candidate files under {}",
            files.len(),
            target_root.display()
        );

        for path in files {
            report.files_scanned += 1;
            self.rewrite_file(&path, map, pattern.as_ref(), &mut report);
        }

        log::info!(
            "Done! Fixed {} files ({} replacements, {} skipped)",
            report.files_modified,
            report.replacement_count,
            report.skipped.len()
        );
        Ok(report)
    }

    fn rewrite_file(
        &self,
        path: &Path,
        map: &GlobalReplacementMap,
        pattern: Option<&Regex>,
        report: &mut RewriteReport,
    ) {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                report.skip(path, format!("read failed: {err}"));
                return;
            }
        };

        let expects_yaml = self.expects_yaml(path);
        let content = match String::from_utf8(bytes) {
            Ok(content) => content,
            Err(_) => {
                if expects_yaml {
                    self.flag_binary(path, report);
                }
                report.skip(path, "not valid UTF-8");
                return;
            }
        };

        if expects_yaml && !content.trim_start_matches(UTF8_BOM).starts_with(YAML_HEADER) {
            self.flag_binary(path, report);
        }

        let Some(pattern) = pattern else {
            return;
        };

        // one pass: a token produced by a replacement is never matched again
        let mut matched: BTreeSet<&Identifier> = BTreeSet::new();
        let updated = pattern.replace_all(&content, |caps: &Captures<'_>| {
            match map.entry_for(&caps[0]) {
                Some((old, new)) => {
                    matched.insert(old);
                    new.as_str().to_owned()
                }
                None => caps[0].to_owned(),
            }
        });

        let hits = matched.len();
        if hits == 0 || updated == content.as_str() {
            return;
        }

        if !self.options.dry_run {
            let written = match self.options.write_mode {
                WriteMode::Direct => fs::write(path, updated.as_bytes()),
                WriteMode::Atomic => write_atomic(path, updated.as_bytes()),
            };
            if let Err(err) = written {
                report.skip(path, format!("write failed: {err}"));
                return;
            }
        }

        log::info!(
            "Fixed references in: {} ({hits} identifiers)",
            path.display()
        );
        report.files_modified += 1;
        report.replacement_count += hits;
        report.modified.push(path.to_path_buf());
    }

    fn expects_yaml(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = normalize_extension(ext);
                self.options
                    .text_asset_extensions
                    .iter()
                    .any(|candidate| *candidate == ext)
            })
            .unwrap_or(false)
    }

    fn flag_binary(&self, path: &Path, report: &mut RewriteReport) {
        log::warn!(
            "{} appears to be binary serialized; switch asset serialization to text to fix its references",
            path.display()
        );
        report.binary_suspects.push(path.to_path_buf());
    }
}

/// Alternation over every old identifier, longest first
fn token_pattern(map: &GlobalReplacementMap) -> Result<Option<Regex>> {
    if map.is_empty() {
        return Ok(None);
    }

    let mut tokens: Vec<&str> = map.iter().map(|(old, _)| old.as_str()).collect();
    tokens.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    let alternation = tokens
        .iter()
        .map(|token| regex::escape(token))
        .collect::<Vec<_>>()
        .join("|");

    let pattern = RegexBuilder::new(&alternation)
        .size_limit(PATTERN_SIZE_LIMIT)
        .build()?;
    Ok(Some(pattern))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let tmp = parent.join(format!(
        ".{}.guidfix-tmp-{}",
        path.file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("asset"),
        std::process::id()
    ));

    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    Ok(())
}
