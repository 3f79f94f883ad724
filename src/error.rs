//! Typed errors for configuration loading, index construction and
//! expression parsing.
//!
//! [`ConfigError`] and [`IndexBuildError`] are fatal to startup: without a
//! usable policy set no declaration can be checked. [`ParseError`] is local to
//! a single expression and is downgraded to
//! [`UsagePolicy::Undefined`](crate::models::UsagePolicy::Undefined) at the
//! resolver boundary.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::UsagePolicy;

/// The policy configuration source could not be read or decoded.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read policy config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON policy config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed TOML policy config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Index(#[from] IndexBuildError),
}

/// The policy list cannot be turned into a consistent index.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexBuildError {
    /// Two distinct policies claim the same SPDX id.
    #[error("conflicting policy for SPDX id `{id}`: `{existing}` is already registered, refusing `{incoming}`")]
    ConflictingId {
        id: String,
        existing: String,
        incoming: String,
    },

    /// A family member disagrees with the usage policy already registered for
    /// its family. Only raised in strict mode.
    #[error("family `{family}` is registered as `{expected}` but policy `{name}` declares `{found}`")]
    FamilyUsageMismatch {
        family: String,
        name: String,
        expected: UsagePolicy,
        found: UsagePolicy,
    },

    /// A policy record failed validation. Only raised in strict mode.
    #[error("invalid policy entry #{position}: {reason}")]
    InvalidEntry { position: usize, reason: String },
}

/// A license expression was rejected by the tokenizer or parser.
///
/// `position` is the zero-based index of the offending token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty license expression")]
    Empty,

    #[error("unexpected token `{token}` at position {position}")]
    UnexpectedToken { token: String, position: usize },

    #[error("expression ends early: operand expected at position {position}")]
    UnexpectedEnd { position: usize },

    #[error("parenthesis opened at position {position} is never closed")]
    UnclosedParen { position: usize },

    #[error("parentheses nested deeper than {limit} at position {position}")]
    TooDeep { position: usize, limit: usize },

    #[error("more than {limit} AND/OR operators; operator at position {position} exceeds the limit")]
    TooLong { position: usize, limit: usize },
}
