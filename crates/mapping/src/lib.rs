//! Sources of tree pairs for the identifier fixer.
//!
//! A [`MappingPlan`] is an ordered list of `(incorrect, correct)` folder pairs
//! plus an optional target tree. Plans come from:
//!
//! - [`ManualSource`]: prompts on any `BufRead`/`Write` pair (stdin/stderr in the CLI)
//! - [`DelimitedFile`]: one `incorrect|correct` pair per line
//! - [`StructuredFile`]: the saved document written by [`write_mapping_file`]
//! - [`discover`]: folder-name matching between a stale tree and a package tree
//!
//! Every path typed or loaded goes through [`sanitize_path`].

pub mod delimited;
pub mod discover;
pub mod manual;
pub mod sanitize;
pub mod source;
pub mod structured;

pub use delimited::parse_delimited;
pub use discover::{discover, DiscoveryReport};
pub use manual::ManualSource;
pub use sanitize::sanitize_path;
pub use source::{DelimitedFile, MappingPlan, MappingSource, StructuredFile};
pub use structured::{parse_mapping_document, write_mapping_file, ParseError, StructuredMappings};
