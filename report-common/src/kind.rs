//! Artifact and usage-site kinds.
//!
//! Packages and scripts share one shape and one cross-reference algorithm,
//! but are never mixed within a report sheet. Usage sites are the
//! policy-like records that can point at an artifact.

use serde::{Deserialize, Serialize};

/// Installable artifact kinds tracked by the usage report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
    /// Installer package (`/JSSResource/packages`)
    Package,
    /// Shell script (`/JSSResource/scripts`)
    Script,
}

impl ArtifactKind {
    /// Returns a lowercase label, used for CLI values and log fields.
    pub fn as_label(&self) -> &'static str {
        match self {
            ArtifactKind::Package => "package",
            ArtifactKind::Script => "script",
        }
    }

    /// Returns the capitalised name used as a column prefix ("Package ID").
    pub fn display_name(&self) -> &'static str {
        match self {
            ArtifactKind::Package => "Package",
            ArtifactKind::Script => "Script",
        }
    }
}

/// Kinds of records that can reference an artifact.
///
/// Declaration order is the default enablement order used when rows for
/// one artifact are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SiteKind {
    /// Regular policy (package configuration or script payload)
    RegularPolicy,
    /// Computer pre-stage enrollment (`customPackageIds`)
    PreStagePolicy,
    /// Patch policy, resolved through its software title versions
    PatchManagementPolicy,
}

impl SiteKind {
    pub fn as_label(&self) -> &'static str {
        match self {
            SiteKind::RegularPolicy => "regular",
            SiteKind::PreStagePolicy => "prestage",
            SiteKind::PatchManagementPolicy => "patch",
        }
    }

    /// Human-readable name, written into the "{Kind} List" column.
    pub fn display_name(&self) -> &'static str {
        match self {
            SiteKind::RegularPolicy => "Regular Policy",
            SiteKind::PreStagePolicy => "PreStage Policy",
            SiteKind::PatchManagementPolicy => "Patch Management Policy",
        }
    }

    /// Column prefix for the site id/name columns of a used row.
    pub fn column_prefix(&self) -> &'static str {
        match self {
            SiteKind::RegularPolicy => "Policy",
            SiteKind::PreStagePolicy => "PreStage Policy",
            SiteKind::PatchManagementPolicy => "Patch Management Policy",
        }
    }
}
