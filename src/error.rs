//! Error types for fundlink.
//!
//! All errors are strongly typed using thiserror. Per-record resolution
//! problems ([`ResolutionError`]) are non-fatal and travel inside a
//! [`crate::ResolutionResult`]; the remaining kinds surface through
//! [`FundLinkError`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fund::FundId;

/// Per-record resolution problems.
///
/// None of these abort a run. They are attached to the result of the record
/// that triggered them and mirrored into the decision log.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolutionError {
    /// A known alias disagrees with the freshly computed match.
    #[error(
        "alias '{raw_name}' from source '{source_id}' already maps to {existing}; computed target {computed} ignored"
    )]
    DuplicateAliasConflict {
        /// Raw name of the replayed alias.
        raw_name: String,
        /// Source the alias belongs to.
        source_id: String,
        /// Fund the alias already points at; this mapping is kept.
        existing: FundId,
        /// Fund the scorer picked instead.
        computed: FundId,
    },

    /// A merge across different fund-family sequence numbers was attempted.
    #[error(
        "sequence veto: '{raw_name}' (sequence {incoming}) cannot be merged into {target} (sequence {existing})"
    )]
    SequenceVetoViolation {
        /// Raw name of the incoming record.
        raw_name: String,
        /// Fund the record was to be linked to.
        target: FundId,
        /// Sequence number carried by the record.
        incoming: u32,
        /// Sequence number of the target fund.
        existing: u32,
    },

    /// A fund ID that is not in the registry.
    #[error("Fund not found: {id}")]
    UnknownFund {
        /// The missing fund ID.
        id: FundId,
    },
}

/// Decision-log failures.
#[derive(Debug, Error)]
pub enum AuditError {
    /// I/O failure.
    #[error("Audit log I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failure.
    #[error("Audit log serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend failure, including poisoned locks.
    #[error("Audit log backend error: {message}")]
    Backend {
        /// Backend-specific description.
        message: String,
    },
}

/// Errors raised by registry storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Key already exists with a different value.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// Fund not found.
    #[error("Fund not found: {0}")]
    FundNotFound(FundId),

    /// I/O failure.
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure.
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed TOML.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values out of range or contradictory.
    #[error("Invalid config: {reason}")]
    Invalid {
        /// What is wrong.
        reason: String,
    },

    /// One GP spelling mapped to two canonical names.
    #[error("GP alias '{alias}' already maps to '{existing}', cannot remap to '{requested}'")]
    ConflictingGpAlias {
        /// The contested spelling.
        alias: String,
        /// Canonical name it already maps to.
        existing: String,
        /// Canonical name that was requested.
        requested: String,
    },
}

impl ConfigError {
    /// Creates an invalid-config error.
    #[must_use]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }
}

/// Top-level error type for fundlink.
#[derive(Debug, Error)]
pub enum FundLinkError {
    /// Per-record resolution error.
    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// Decision log error.
    #[error("Audit error: {0}")]
    Audit(#[from] AuditError),

    /// Registry store error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Internal error (poisoned lock, inconsistent index).
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

impl FundLinkError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a storage error.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true if retrying the same record could succeed.
    ///
    /// Only storage I/O and backend failures are transient; everything else
    /// is deterministic in its inputs.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Storage(e) => matches!(e, StorageError::Io(_) | StorageError::BackendError(_)),
            Self::Audit(e) => matches!(e, AuditError::Io(_)),
            Self::Resolution(_) | Self::Config(_) | Self::Internal { .. } => false,
        }
    }
}

/// Result type alias for fundlink operations.
pub type FundLinkResult<T> = Result<T, FundLinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_veto_message() {
        let err = ResolutionError::SequenceVetoViolation {
            raw_name: "Acme Partners V".to_string(),
            target: FundId::nil(),
            incoming: 5,
            existing: 4,
        };
        let msg = format!("{err}");
        assert!(msg.contains("sequence veto"));
        assert!(msg.contains("Acme Partners V"));
        assert!(msg.contains("(sequence 4)"));
    }

    #[test]
    fn test_duplicate_alias_conflict_message() {
        let err = ResolutionError::DuplicateAliasConflict {
            raw_name: "BCP VII".to_string(),
            source_id: "calpers".to_string(),
            existing: FundId::nil(),
            computed: FundId::nil(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("BCP VII"));
        assert!(msg.contains("calpers"));
    }

    #[test]
    fn test_config_invalid() {
        let err: FundLinkError = ConfigError::invalid("name_threshold must be in (0, 1]").into();
        assert!(!err.is_retryable());
        assert!(format!("{err}").contains("name_threshold"));
    }

    #[test]
    fn test_storage_io_is_retryable() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err: FundLinkError = StorageError::Io(io).into();
        assert!(err.is_storage());
        assert!(err.is_retryable());

        let dup: FundLinkError = StorageError::DuplicateKey("x".to_string()).into();
        assert!(!dup.is_retryable());
    }

    #[test]
    fn test_internal() {
        let err = FundLinkError::internal("poisoned lock: registry.resolve");
        assert!(err.is_internal());
        assert!(format!("{err}").contains("poisoned lock"));
    }

    #[test]
    fn test_resolution_error_serializes_with_kind_tag() {
        let err = ResolutionError::UnknownFund { id: FundId::nil() };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "unknown_fund");
    }
}
