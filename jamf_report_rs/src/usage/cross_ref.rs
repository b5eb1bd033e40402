//! The cross-reference pass: artifacts x usage index -> rows.

use report_common::{ArtifactKind, Cell, ReportRow, SiteKind};

use super::{Artifact, ArtifactMeta, LookupFailure, MetadataTable, SiteCatalogs, UsageIndex, UsageSite};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageStatus {
    Used,
    NotUsed,
}

/// One emitted row: an artifact and, when used, the site citing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRow {
    pub kind: ArtifactKind,
    pub status: UsageStatus,
    pub artifact: ArtifactMeta,
    pub site: Option<UsageSite>,
}

impl UsageRow {
    pub fn type_label(&self) -> String {
        match self.status {
            UsageStatus::Used => format!("{} Used", self.kind.display_name()),
            UsageStatus::NotUsed => format!("{} Not Used", self.kind.display_name()),
        }
    }

    /// Flatten into sheet columns. Site columns are only present for the
    /// site's own kind; the table fills the rest with empty cells.
    pub fn to_report_row(&self) -> ReportRow {
        let label = self.kind.display_name();
        let list = self
            .site
            .as_ref()
            .map(|site| Cell::from(site.kind.display_name()))
            .unwrap_or_default();

        let mut row = ReportRow::new()
            .with("Type", self.type_label())
            .with(format!("{label} List"), list)
            .with(format!("{label} ID"), self.artifact.id)
            .with(format!("{label} Name"), &self.artifact.name)
            .with(format!("{label} File Name"), &self.artifact.filename);

        if let Some(site) = &self.site {
            let prefix = site.kind.column_prefix();
            row.set(format!("{prefix} ID"), site.site_id.to_cell());
            row.set(format!("{prefix} Name"), &site.site_name);
            if site.kind == SiteKind::PatchManagementPolicy {
                row.set(
                    format!("{prefix} Software Version Name"),
                    site.software_version.clone(),
                );
            }
        }
        row
    }
}

/// An artifact left out of the report because its detail lookup failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedArtifact {
    pub id: i64,
    pub name: String,
    pub reason: LookupFailure,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrossReference {
    pub rows: Vec<UsageRow>,
    pub skipped: Vec<SkippedArtifact>,
}

impl CrossReference {
    pub fn rows_for(&self, artifact_id: i64) -> impl Iterator<Item = &UsageRow> {
        self.rows.iter().filter(move |row| row.artifact.id == artifact_id)
    }

    pub fn report_rows(&self) -> Vec<ReportRow> {
        self.rows.iter().map(UsageRow::to_report_row).collect()
    }
}

/// Classify every artifact against every enabled site kind.
///
/// Artifacts are visited in ascending id order (stable for duplicates). A used
/// artifact gets one row per matching site across all kinds; an unused one gets
/// a single `NotUsed` row. Artifacts whose metadata did not resolve produce no
/// rows and are listed in [`CrossReference::skipped`].
pub fn cross_reference(
    kind: ArtifactKind,
    artifacts: &[Artifact],
    catalogs: &SiteCatalogs,
    metadata: &MetadataTable,
) -> CrossReference {
    let index = UsageIndex::build(catalogs);

    let mut ordered: Vec<&Artifact> = artifacts.iter().collect();
    ordered.sort_by_key(|artifact| artifact.id);

    let mut result = CrossReference::default();
    for artifact in ordered {
        let meta = match metadata.lookup(artifact.id) {
            Ok(meta) => meta,
            Err(reason) => {
                let what = format!("{} {} ({})", kind.as_label(), artifact.id, artifact.name);
                match &reason {
                    LookupFailure::NotFound => {
                        tracing::info!("{what} no longer exists, skipping");
                    }
                    _ => tracing::warn!("skipping {what}: {reason}"),
                }
                result.skipped.push(SkippedArtifact {
                    id: artifact.id,
                    name: artifact.name.clone(),
                    reason,
                });
                continue;
            }
        };

        let sites = index.sites_for(&artifact.id_key());
        if sites.is_empty() {
            result.rows.push(UsageRow {
                kind,
                status: UsageStatus::NotUsed,
                artifact: meta.clone(),
                site: None,
            });
            continue;
        }
        for site in sites {
            result.rows.push(UsageRow {
                kind,
                status: UsageStatus::Used,
                artifact: meta.clone(),
                site: Some(site.clone()),
            });
        }
    }

    tracing::debug!(
        "{} cross-reference: {} row(s), {} skipped",
        kind.as_label(),
        result.rows.len(),
        result.skipped.len()
    );
    result
}
