use std::path::PathBuf;
use thiserror::Error;

use crate::Identifier;

pub type Result<T> = std::result::Result<T, FixerError>;

#[derive(Error, Debug)]
pub enum FixerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Directory walk error: {0}")]
    WalkError(#[from] walkdir::Error),

    #[error("Invalid tree path: {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Two tree pairs map the same old identifier to different new ones
    #[error("Identifier collision for {old}: {previous} vs {incoming}")]
    Collision {
        old: Identifier,
        previous: Identifier,
        incoming: Identifier,
    },

    #[error("Pattern error: {0}")]
    PatternError(#[from] regex::Error),

    #[error("No identifier found in {}", .0.display())]
    MissingIdentifier(PathBuf),
}

impl FixerError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
