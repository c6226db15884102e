//! # fundlink - Entity resolution for private-market funds
//!
//! Pension systems, endowments and regulators each report the same private
//! funds under their own spellings. fundlink decides, record by record, which
//! canonical fund a raw name refers to, creates a new canonical fund when none
//! matches, and keeps an auditable trail of every decision.
//!
//! ## Core Concepts
//!
//! - **Canonical fund**: the single authoritative entity for one real fund
//! - **Alias**: a raw spelling of a fund as seen from one source
//! - **Sequence veto**: funds with different family numbers ("Fund IV" vs
//!   "Fund V") are never merged, however similar their names
//! - **Decision log**: append-only record of every link, creation and override
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use fundlink::{EngineConfig, FundRegistry, InMemoryDecisionLog, MatchType, RawFundRecord};
//!
//! let config = EngineConfig::from_toml_str(
//!     r#"
//!     [gp_aliases]
//!     "Kohlberg Kravis Roberts" = ["KKR"]
//!     "#,
//! )?;
//! let registry = FundRegistry::new(&config, Arc::new(InMemoryDecisionLog::new()))?;
//!
//! let first = registry.resolve(
//!     &RawFundRecord::new("KKR 2006 Fund, L.P.", "wsib")
//!         .with_general_partner("Kohlberg Kravis Roberts")
//!         .with_vintage_year(2006),
//! )?;
//! assert!(first.created_new);
//!
//! let second = registry.resolve(
//!     &RawFundRecord::new("KKR 2006 Fund", "calpers")
//!         .with_general_partner("KKR")
//!         .with_vintage_year(2006),
//! )?;
//! assert_eq!(second.fund_id, first.fund_id);
//! assert_eq!(second.match_type, MatchType::Exact);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod error;
pub mod fund;
pub mod record;

// Matching
pub mod classify;
pub mod normalize;
pub mod scoring;
pub mod similarity;

// Registry, audit and storage
pub mod audit;
pub mod batch;
pub mod config;
pub mod registry;
pub mod storage;

// Re-export primary types at crate root for convenience
pub use audit::{DecisionLog, DecisionOutcome, InMemoryDecisionLog, JsonlDecisionLog, MatchDecision};
pub use batch::{BatchResolver, RunReport, SourceBatch};
pub use config::{EngineConfig, MatchPolicy, OverrideEntry};
pub use error::{
    AuditError, ConfigError, FundLinkError, FundLinkResult, ResolutionError, StorageError,
};
pub use fund::{Alias, AliasKey, CanonicalFund, FundId};
pub use record::{MatchType, RawFundRecord, ResolutionResult};
pub use registry::{FlushReport, FundRegistry, RegistryStats};
pub use scoring::{MatchOutcome, Scorer, SequenceAgreement, Signals};
pub use storage::{InMemoryRegistryStore, JsonFileStore, RegistrySnapshot, RegistryStore};
