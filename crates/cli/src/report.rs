use guidfix_core::{
    AggregateReport, GlobalReplacementMap, MissingScriptReport, PairOutcome, RewriteReport,
};
use guidfix_mapping::DiscoveryReport;
use serde::Serialize;
use std::path::PathBuf;

/// Everything one `fix` run produced, as printed with `--json`
#[derive(Debug, Default, Serialize)]
pub struct FixReport {
    pub pairs_rejected: usize,
    pub target: Option<PathBuf>,
    /// Fallback tree searched for descriptors the correct trees lack
    pub source: Option<PathBuf>,
    pub aggregate: AggregateReport,
    pub rewrite: Option<RewriteReport>,
    pub deleted: Vec<PathBuf>,
}

/// A `missing` run: the scan, plus the assignments applied after it
#[derive(Debug, Serialize)]
pub struct MissingOutcome {
    #[serde(flatten)]
    pub scan: MissingScriptReport,
    #[serde(skip_serializing_if = "GlobalReplacementMap::is_empty")]
    pub assigned: GlobalReplacementMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewrite: Option<RewriteReport>,
}

pub fn render_fix_summary(report: &FixReport) -> String {
    let mut out = String::new();
    out.push_str("== guidfix summary ==\n");
    if let Some(target) = &report.target {
        out.push_str(&format!("Target:        {}\n", target.display()));
    }
    if let Some(source) = &report.source {
        match report.aggregate.fallback_indexed {
            Some(indexed) => out.push_str(&format!(
                "Fallback:      {} ({indexed} indexed)\n",
                source.display()
            )),
            None => out.push_str(&format!("Fallback:      {} (missing)\n", source.display())),
        }
    }

    for (idx, outcome) in report.aggregate.outcomes.iter().enumerate() {
        match outcome {
            PairOutcome::Processed {
                pair,
                indexed,
                replacements,
            } => {
                out.push_str(&format!(
                    "Pair {}:        {} -> {} ({indexed} indexed, {} replacements)\n",
                    idx + 1,
                    pair.incorrect.display(),
                    pair.correct.display(),
                    replacements.len(),
                ));
                let from_fallback = replacements.iter().filter(|r| r.via_fallback).count();
                if from_fallback > 0 {
                    out.push_str(&format!("               {from_fallback} found via fallback\n"));
                }
            }
            PairOutcome::Skipped { pair, missing } => out.push_str(&format!(
                "Pair {}:        skipped {} ({} missing)\n",
                idx + 1,
                pair.incorrect.display(),
                missing
                    .iter()
                    .map(|path| path.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            )),
        }
    }
    if report.pairs_rejected > 0 {
        out.push_str(&format!("Rejected:      {} malformed pairs\n", report.pairs_rejected));
    }
    out.push_str(&format!("Map size:      {}\n", report.aggregate.map.len()));
    if !report.aggregate.collisions.is_empty() {
        out.push_str(&format!(
            "Collisions:    {}\n",
            report.aggregate.collisions.len()
        ));
    }

    match &report.rewrite {
        Some(rewrite) => push_rewrite(&mut out, rewrite),
        None => out.push_str("Rewrite:       not run\n"),
    }

    for path in &report.deleted {
        out.push_str(&format!("Deleted:       {}\n", path.display()));
    }
    out
}

fn push_rewrite(out: &mut String, rewrite: &RewriteReport) {
    if rewrite.dry_run {
        out.push_str("Mode:          dry run, nothing written\n");
    }
    out.push_str(&format!("Scanned:       {}\n", rewrite.files_scanned));
    out.push_str(&format!("Modified:      {}\n", rewrite.files_modified));
    out.push_str(&format!("Replacements:  {}\n", rewrite.replacement_count));
    for path in &rewrite.modified {
        out.push_str(&format!("  ~ {}\n", path.display()));
    }
    if !rewrite.skipped.is_empty() {
        out.push_str(&format!("Skipped:       {}\n", rewrite.skipped.len()));
        for skipped in &rewrite.skipped {
            out.push_str(&format!("  ! {} ({})\n", skipped.path.display(), skipped.reason));
        }
    }
    if !rewrite.binary_suspects.is_empty() {
        out.push_str("Binary-serialized assets (switch the project to text serialization):\n");
        for path in &rewrite.binary_suspects {
            out.push_str(&format!("  ? {}\n", path.display()));
        }
    }
}

pub fn render_discovery(report: &DiscoveryReport) -> String {
    let mut out = String::new();
    for pair in &report.pairs {
        out.push_str(&format!(
            "{}|{}\n",
            pair.incorrect.display(),
            pair.correct.display()
        ));
    }
    out.push_str(&format!(
        "# {} pairs ({} name matches, {} source folders indexed)\n",
        report.pairs.len(),
        report.candidates,
        report.indexed_sources
    ));
    out
}

pub fn render_missing(outcome: &MissingOutcome) -> String {
    let mut out = render_missing_scan(&outcome.scan);
    for (old, new) in outcome.assigned.iter() {
        out.push_str(&format!("Assigned:      {old} -> {new}\n"));
    }
    if let Some(rewrite) = &outcome.rewrite {
        push_rewrite(&mut out, rewrite);
    }
    out
}

fn render_missing_scan(report: &MissingScriptReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Scanned {} files against {} known identifiers\n",
        report.files_scanned, report.known_identifiers
    ));
    if report.missing.is_empty() {
        out.push_str("No missing script references\n");
        return out;
    }

    out.push_str("| identifier | uses | examples |\n");
    out.push_str("|---|---:|---|\n");
    for missing in &report.missing {
        out.push_str(&format!(
            "| `{}` | {} | {} |\n",
            missing.id,
            missing.occurrences,
            missing.examples.join(", ")
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use guidfix_core::{Identifier, MissingReference, ReplacementPair, TreePair};

    #[test]
    fn fix_summary_lists_pairs_and_modified_files() {
        let mut report = FixReport {
            target: Some(PathBuf::from("Assets")),
            ..FixReport::default()
        };
        report.aggregate.outcomes = vec![
            PairOutcome::Processed {
                pair: TreePair::new("old", "new"),
                indexed: 4,
                replacements: vec![
                    ReplacementPair {
                        file_name: "A.cs.meta".to_string(),
                        old: Identifier::new("9".repeat(32)),
                        new: Identifier::new("1".repeat(32)),
                        via_fallback: false,
                    },
                    ReplacementPair {
                        file_name: "B.cs.meta".to_string(),
                        old: Identifier::new("8".repeat(32)),
                        new: Identifier::new("2".repeat(32)),
                        via_fallback: true,
                    },
                ],
            },
            PairOutcome::Skipped {
                pair: TreePair::new("gone", "new"),
                missing: vec![PathBuf::from("gone")],
            },
        ];
        report.rewrite = Some(RewriteReport {
            files_scanned: 3,
            files_modified: 1,
            replacement_count: 2,
            modified: vec![PathBuf::from("Assets/Scene.unity")],
            ..RewriteReport::default()
        });

        let text = render_fix_summary(&report);
        assert!(text.contains("old -> new (4 indexed, 2 replacements)"));
        assert!(text.contains("1 found via fallback"));
        assert!(text.contains("skipped gone (gone missing)"));
        assert!(text.contains("Modified:      1"));
        assert!(text.contains("~ Assets/Scene.unity"));
    }

    #[test]
    fn discovery_renders_as_pairs_file() {
        let report = DiscoveryReport {
            pairs: vec![TreePair::new("Assets/DOTween", "Cache/DOTween")],
            candidates: 2,
            indexed_sources: 9,
        };
        let text = render_discovery(&report);
        assert!(text.starts_with("Assets/DOTween|Cache/DOTween\n"));
        assert_eq!(guidfix_mapping::parse_delimited(&text).pairs.len(), 1);
    }

    #[test]
    fn missing_report_has_table_row_per_identifier() {
        let outcome = MissingOutcome {
            scan: MissingScriptReport {
                known_identifiers: 1,
                files_scanned: 2,
                missing: vec![MissingReference {
                    id: Identifier::new("a".repeat(32)),
                    occurrences: 3,
                    examples: vec!["Main.unity".to_string()],
                }],
            },
            assigned: GlobalReplacementMap::new(),
            rewrite: None,
        };
        let text = render_missing(&outcome);
        assert!(text.contains(&format!("| `{}` | 3 | Main.unity |", "a".repeat(32))));
        assert!(!text.contains("Assigned:"));
    }

    #[test]
    fn missing_report_lists_applied_assignments() {
        let assigned: GlobalReplacementMap =
            [(Identifier::new("a".repeat(32)), Identifier::new("b".repeat(32)))]
                .into_iter()
                .collect();
        let outcome = MissingOutcome {
            scan: MissingScriptReport::default(),
            assigned,
            rewrite: Some(RewriteReport {
                files_modified: 1,
                ..RewriteReport::default()
            }),
        };
        let text = render_missing(&outcome);
        assert!(text.contains(&format!("Assigned:      {} -> {}", "a".repeat(32), "b".repeat(32))));
        assert!(text.contains("Modified:      1"));
    }
}
