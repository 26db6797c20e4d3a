//! Harvest error taxonomy
//!
//! Every failure path inside the pipeline ends up as one of these variants.
//! Per-entity errors are converted into outcome values at the player
//! boundary; only top-level failures escape to the caller.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarvestError {
    /// Identifier could not be parsed into a canonical key
    #[error("Malformed reference '{raw}': {reason}")]
    MalformedReference { raw: String, reason: String },

    /// Network-level failure that survived every retry
    #[error("Transient failure fetching {url} after {attempts} attempt(s): {message}")]
    TransientFailure {
        url: String,
        attempts: u32,
        message: String,
    },

    /// Every candidate source reported the content as absent
    #[error("Not found: {reference}")]
    NotFound { reference: String },

    #[error("Codec failure for {path}: {message}")]
    CodecFailure { path: String, message: String },

    /// Fetched document lacks the expected structure
    #[error("Unexpected page structure ({context}): {detail}")]
    ParseStructureMismatch { context: String, detail: String },

    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl HarvestError {
    pub fn malformed(raw: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedReference {
            raw: raw.into(),
            reason: reason.into(),
        }
    }

    pub fn structure(context: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ParseStructureMismatch {
            context: context.into(),
            detail: detail.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Short stable label used in logs
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MalformedReference { .. } => "malformed_reference",
            Self::TransientFailure { .. } => "transient_failure",
            Self::NotFound { .. } => "not_found",
            Self::CodecFailure { .. } => "codec_failure",
            Self::ParseStructureMismatch { .. } => "parse_structure_mismatch",
            Self::Io { .. } => "io",
        }
    }
}
