//! Package/script usage cross-reference.
//!
//! Given a catalog of artifacts and the usage sites collected for every
//! enabled [`SiteKind`], decide for each artifact which sites reference it.
//! Everything in this module is synchronous and pure: the network work that
//! fills [`SiteCatalogs`] and [`MetadataTable`] happens before, in
//! [`crate::collect`].
//!
//! # Example
//!
//! ```rust
//! use jamf_report::usage::{
//!     Artifact, ArtifactMeta, MetadataTable, SiteCatalogs, SiteId, UsageSite, cross_reference,
//! };
//! use report_common::{ArtifactKind, SiteKind};
//!
//! let artifacts = vec![Artifact::new(1, "Chrome", "chrome.pkg")];
//! let mut catalogs = SiteCatalogs::new();
//! catalogs.enable(
//!     SiteKind::RegularPolicy,
//!     vec![UsageSite::new(SiteKind::RegularPolicy, SiteId::Int(10), "Deploy Chrome", "1")],
//! );
//! let metadata: MetadataTable = vec![ArtifactMeta::new(1, "Chrome", "chrome.pkg")]
//!     .into_iter()
//!     .collect();
//!
//! let result = cross_reference(ArtifactKind::Package, &artifacts, &catalogs, &metadata);
//! assert_eq!(result.rows.len(), 1);
//! ```

mod cross_ref;
mod index;

use std::collections::HashMap;
use std::fmt;

use report_common::{Cell, SiteKind};

pub use cross_ref::{CrossReference, SkippedArtifact, UsageRow, UsageStatus, cross_reference};
pub use index::UsageIndex;

/// An installable unit as listed by the collection endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub id: i64,
    pub name: String,
    /// Empty until the detail record has been looked up.
    pub filename: String,
}

impl Artifact {
    pub fn new(id: i64, name: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            filename: filename.into(),
        }
    }

    /// Key used for index lookups.
    pub fn id_key(&self) -> String {
        self.id.to_string()
    }
}

/// Canonical artifact detail, as returned by the per-id endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactMeta {
    pub id: i64,
    pub name: String,
    pub filename: String,
    pub category: String,
}

impl ArtifactMeta {
    pub fn new(id: i64, name: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            filename: filename.into(),
            category: String::new(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }
}

/// Why an artifact's detail record could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupFailure {
    /// Deleted between listing and detail fetch.
    NotFound,
    /// Retries exhausted or an unexpected status.
    Unavailable(String),
    /// Required field missing from the payload.
    Malformed(String),
}

impl fmt::Display for LookupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupFailure::NotFound => f.write_str("not found"),
            LookupFailure::Unavailable(reason) => write!(f, "unavailable: {reason}"),
            LookupFailure::Malformed(reason) => write!(f, "malformed: {reason}"),
        }
    }
}

/// Artifact id -> detail lookup outcome, filled before cross-referencing.
#[derive(Debug, Clone, Default)]
pub struct MetadataTable {
    entries: HashMap<i64, Result<ArtifactMeta, LookupFailure>>,
}

impl MetadataTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: i64, outcome: Result<ArtifactMeta, LookupFailure>) {
        self.entries.insert(id, outcome);
    }

    /// Resolve an id. An id that was never looked up counts as unavailable.
    pub fn lookup(&self, id: i64) -> Result<&ArtifactMeta, LookupFailure> {
        match self.entries.get(&id) {
            Some(Ok(meta)) => Ok(meta),
            Some(Err(failure)) => Err(failure.clone()),
            None => Err(LookupFailure::Unavailable("no detail lookup recorded".into())),
        }
    }

    pub fn contains(&self, id: i64) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<ArtifactMeta> for MetadataTable {
    fn from_iter<I: IntoIterator<Item = ArtifactMeta>>(iter: I) -> Self {
        let mut table = MetadataTable::new();
        for meta in iter {
            table.insert(meta.id, Ok(meta));
        }
        table
    }
}

/// Identifier of a usage site. Classic-API records use integers, pre-stage
/// enrollments use strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SiteId {
    Int(i64),
    Text(String),
}

impl SiteId {
    pub fn to_cell(&self) -> Cell {
        match self {
            SiteId::Int(v) => Cell::Int(*v),
            SiteId::Text(s) => Cell::id_like(s),
        }
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiteId::Int(v) => write!(f, "{v}"),
            SiteId::Text(s) => f.write_str(s),
        }
    }
}

/// One reference from a usage site to one artifact.
///
/// A policy carrying three packages contributes three entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageSite {
    pub kind: SiteKind,
    pub site_id: SiteId,
    pub site_name: String,
    /// Referenced artifact id, as a string. Compared verbatim.
    pub artifact_id: String,
    /// Patch software version that carries the package.
    pub software_version: Option<String>,
}

impl UsageSite {
    pub fn new(
        kind: SiteKind,
        site_id: SiteId,
        site_name: impl Into<String>,
        artifact_id: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            site_id,
            site_name: site_name.into(),
            artifact_id: artifact_id.into(),
            software_version: None,
        }
    }

    pub fn with_software_version(mut self, version: impl Into<String>) -> Self {
        self.software_version = Some(version.into());
        self
    }
}

/// Usage sites per enabled kind, in enablement order.
#[derive(Debug, Clone, Default)]
pub struct SiteCatalogs {
    catalogs: Vec<(SiteKind, Vec<UsageSite>)>,
}

impl SiteCatalogs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable a kind with its complete catalog. Enabling a kind twice
    /// appends to the existing catalog and keeps its first position.
    pub fn enable(&mut self, kind: SiteKind, sites: Vec<UsageSite>) {
        match self.catalogs.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, existing)) => existing.extend(sites),
            None => self.catalogs.push((kind, sites)),
        }
    }

    pub fn kinds(&self) -> impl Iterator<Item = SiteKind> + '_ {
        self.catalogs.iter().map(|(kind, _)| *kind)
    }

    pub fn sites(&self, kind: SiteKind) -> &[UsageSite] {
        self.catalogs
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, sites)| sites.as_slice())
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (SiteKind, &[UsageSite])> {
        self.catalogs
            .iter()
            .map(|(kind, sites)| (*kind, sites.as_slice()))
    }

    pub fn total_sites(&self) -> usize {
        self.catalogs.iter().map(|(_, sites)| sites.len()).sum()
    }
}
