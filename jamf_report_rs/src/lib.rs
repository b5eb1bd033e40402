//! # jamf-report
//!
//! **Jamf Pro report generator** - walks a Jamf Pro instance read-only and
//! writes one multi-sheet workbook (or JSON document) describing computers,
//! policies, configuration profiles, and which packages and scripts are
//! actually used.
//!
//! ## Features
//!
//! - **Usage cross-reference** - every package and script, with each regular
//!   policy, pre-stage enrollment and patch policy that references it, or a
//!   highlighted "not used" row
//! - **Inventory sheets** - computers (hardware, FileVault, local accounts,
//!   group and profile membership), policies and configuration profiles
//! - **Resilient walks** - bounded concurrency, retry with backoff, token
//!   refresh; a record that fails is skipped, never the whole run
//!
//! ## Library Usage
//!
//! The cross-reference core is pure and works on plain values:
//!
//! ```rust
//! use jamf_report::usage::{Artifact, ArtifactMeta, MetadataTable, SiteCatalogs, cross_reference};
//! use report_common::ArtifactKind;
//!
//! let artifacts = vec![Artifact::new(3, "Firefox", "firefox.pkg")];
//! let metadata: MetadataTable = vec![ArtifactMeta::new(3, "Firefox", "firefox.pkg")]
//!     .into_iter()
//!     .collect();
//!
//! let result = cross_reference(ArtifactKind::Package, &artifacts, &SiteCatalogs::new(), &metadata);
//! assert_eq!(result.rows[0].type_label(), "Package Not Used");
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! jamfrep --url https://example.jamfcloud.com --username api-reader
//! jamfrep --sheets packages,scripts --output usage.xlsx --yes
//! jamfrep --format json --output - | jq '.sheets[].name'
//! ```

// ============================================================================
// Core
// ============================================================================

/// Package/script usage cross-reference (pure, synchronous).
pub mod usage;

/// Row tables, column union, and the xlsx / JSON sinks.
pub mod report;

// ============================================================================
// Server access
// ============================================================================

/// Transport trait, HTTP transport, token session and typed endpoints.
pub mod api;

/// Error taxonomy for API access.
pub mod error;

/// Collection walkers feeding the report.
pub mod collect;

/// Bounded, order-preserving fan-out.
pub mod pool;

// ============================================================================
// Run orchestration & operator surface
// ============================================================================

pub mod cli;
pub mod config;
pub mod pipeline;
pub mod progress;
pub mod prompt;

pub use config::{ReportConfig, Settings};
pub use error::ApiError;
pub use pipeline::{RunSummary, execute, report};
