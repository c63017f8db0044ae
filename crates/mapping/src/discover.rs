//! Folder-pair discovery.
//!
//! Matches folder names under a stale tree against folders near the top of a
//! source tree (usually installed packages), so that a move from
//! `Assets/Plugins/Cinemachine` to `Library/PackageCache/com.unity.cinemachine@2.10.3`
//! can be proposed without typing paths by hand.

use anyhow::{Context, Result};
use guidfix_core::TreePair;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Structural folder names that show up in nearly every package
const IGNORE_NAMES: &[&str] = &[
    "core",
    "editor",
    "runtime",
    "resources",
    "tests",
    "samples",
    "examples",
    "data",
    "internal",
    "utils",
    "extensions",
    "legacy",
    "serialization",
    "events",
    "jobs",
    "layers",
    "enums",
    "classes",
    "interfaces",
    "structs",
    "models",
    "views",
    "controllers",
    "prefabs",
    "materials",
    "textures",
    "images",
    "audio",
    "sounds",
    "music",
    "fonts",
    "shaders",
    "scenes",
    "animations",
    "animators",
    "streamingassets",
    "gizmos",
    "settings",
    "documentation",
    "docs",
];

#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveryReport {
    /// Accepted pairs, outermost folders only
    pub pairs: Vec<TreePair>,
    /// Name matches before nested ones were dropped
    pub candidates: usize,
    /// Distinct lookup keys built from the source tree
    pub indexed_sources: usize,
}

pub fn discover(source_root: &Path, old_root: &Path) -> Result<DiscoveryReport> {
    for root in [source_root, old_root] {
        if !root.is_dir() {
            anyhow::bail!("Not a directory: {}", root.display());
        }
    }

    let sources = index_sources(source_root)?;
    log::info!(
        "Indexed {} source folders under {}",
        sources.len(),
        source_root.display()
    );

    let mut candidates = Vec::new();
    for entry in WalkDir::new(old_root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("walk {}", old_root.display()))?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let name = folder_name(&entry);
        if is_generic(&name) {
            continue;
        }
        if let Some(source) = sources.get(&name) {
            candidates.push(TreePair::new(entry.path(), source));
        }
    }

    let found = candidates.len();
    let pairs = drop_nested(candidates);
    log::info!(
        "Found {} folder pairs ({} name matches)",
        pairs.len(),
        found
    );

    Ok(DiscoveryReport {
        pairs,
        candidates: found,
        indexed_sources: sources.len(),
    })
}

/// Lower-cased folder name (and its `name@version` stem) to path, for the
/// first two levels below `root`. Second-level folders override first-level
/// ones.
fn index_sources(root: &Path) -> Result<HashMap<String, PathBuf>> {
    let mut entries = Vec::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(2)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry));
    for entry in walker {
        let entry = entry.with_context(|| format!("walk {}", root.display()))?;
        if entry.file_type().is_dir() {
            entries.push(entry);
        }
    }
    entries.sort_by_key(DirEntry::depth);

    let mut sources = HashMap::new();
    for entry in entries {
        let name = folder_name(&entry);
        if is_generic(&name) {
            continue;
        }
        if let Some((stem, _version)) = name.split_once('@') {
            sources.insert(stem.to_string(), entry.path().to_path_buf());
        }
        sources.insert(name, entry.path().to_path_buf());
    }
    Ok(sources)
}

fn drop_nested(mut candidates: Vec<TreePair>) -> Vec<TreePair> {
    candidates.sort_by_key(|pair| pair.incorrect.as_os_str().len());

    let mut accepted: Vec<TreePair> = Vec::new();
    for candidate in candidates {
        let nested = accepted.iter().any(|kept| {
            candidate.incorrect != kept.incorrect && candidate.incorrect.starts_with(&kept.incorrect)
        });
        if nested {
            log::debug!("Skipping nested folder {}", candidate.incorrect.display());
            continue;
        }
        accepted.push(candidate);
    }
    accepted
}

fn folder_name(entry: &DirEntry) -> String {
    entry.file_name().to_string_lossy().to_lowercase()
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn is_generic(name: &str) -> bool {
    IGNORE_NAMES.contains(&name)
}
