//! # GUID Fixer Core
//!
//! Reconciles asset identifiers between a stale copy of an asset tree and its
//! authoritative copy, then propagates the corrected identifiers through the
//! text assets of a project.
//!
//! ## Pipeline
//!
//! ```text
//! correct tree ──> ReferenceIndexer ──> ReferenceIndex (file name -> id)
//!                                            │
//! incorrect tree ──> MismatchDetector <──────┘
//!                         └─> ReplacementPair (old -> new)
//!
//! per tree pair, in order ──> MappingAggregator ──> GlobalReplacementMap
//!
//! target tree ──> BulkRewriter (allow-listed extensions only)
//!                    └─> RewriteReport
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use guidfix_core::{FixerConfig, GuidFixer, TreePair};
//! use std::path::Path;
//!
//! fn main() -> guidfix_core::Result<()> {
//!     let fixer = GuidFixer::new(FixerConfig::default())?;
//!     let report = fixer.aggregate(&[TreePair::new(
//!         "Assets/Scripts/Cinemachine",
//!         "Library/PackageCache/com.unity.cinemachine@2.10.3",
//!     )])?;
//!     let rewrite = fixer.rewrite(Path::new("Assets"), &report.map, fixer.rewrite_options())?;
//!
//!     println!("Fixed {} files", rewrite.files_modified);
//!     Ok(())
//! }
//! ```

mod aggregate;
mod config;
mod error;
mod identifier;
mod mismatch;
mod missing;
mod pipeline;
mod reference;
mod rewrite;
mod scanner;

pub use aggregate::{
    AggregateReport, Collision, GlobalReplacementMap, MappingAggregator, PairOutcome, TreePair,
};
pub use config::{CollisionPolicy, ExtractionConfig, FixerConfig, StrategyKind, WriteMode};
pub use error::{FixerError, Result};
pub use identifier::{
    ExtractStrategy, Identifier, IdentifierExtractor, DEFAULT_IDENTIFIER_LEN, DEFAULT_MARKER,
    DEFAULT_OFFSET,
};
pub use mismatch::{MismatchDetector, ReplacementPair};
pub use missing::{
    MissingReference, MissingScriptReport, MissingScriptScanner, ScriptAssignment,
};
pub use pipeline::GuidFixer;
pub use reference::{ReferenceIndex, ReferenceIndexer};
pub use rewrite::{BulkRewriter, RewriteOptions, RewriteReport, SkippedFile};
pub use scanner::TreeScanner;
