//! Package and script catalogs plus their detail lookups.

use std::collections::BTreeSet;

use report_common::ArtifactKind;

use crate::api::models::{ArtifactDetail, NamedRef};
use crate::api::{JamfClient, Transport};
use crate::error::ApiError;
use crate::pool::map_ordered;
use crate::usage::{Artifact, ArtifactMeta, LookupFailure, MetadataTable};

impl From<&ApiError> for LookupFailure {
    fn from(err: &ApiError) -> Self {
        match err {
            ApiError::NotFound { .. } => LookupFailure::NotFound,
            ApiError::Malformed { reason, .. } => LookupFailure::Malformed(reason.clone()),
            other => LookupFailure::Unavailable(other.to_string()),
        }
    }
}

impl From<ArtifactDetail> for ArtifactMeta {
    fn from(detail: ArtifactDetail) -> Self {
        ArtifactMeta::new(detail.id, detail.name, detail.filename).with_category(detail.category)
    }
}

/// Every artifact of `kind`, as listed. Filenames stay empty until the
/// metadata pass.
pub async fn list_artifacts<T: Transport>(
    client: &JamfClient<T>,
    kind: ArtifactKind,
) -> Result<Vec<Artifact>, ApiError> {
    let listed: Vec<NamedRef> = match kind {
        ArtifactKind::Package => client.packages().await?,
        ArtifactKind::Script => client.scripts().await?,
    };
    tracing::debug!("listed {} {}s", listed.len(), kind.as_label());
    Ok(listed
        .into_iter()
        .map(|entry| Artifact::new(entry.id, entry.name, ""))
        .collect())
}

/// Fetch the detail record of each distinct id.
///
/// Every id ends up in the table, either resolved or with the reason it
/// could not be; the cross-reference pass reports the failures. Only an
/// authentication failure aborts.
pub async fn fetch_metadata<T: Transport>(
    client: &JamfClient<T>,
    kind: ArtifactKind,
    ids: impl IntoIterator<Item = i64>,
    limit: usize,
) -> Result<MetadataTable, ApiError> {
    let unique: BTreeSet<i64> = ids.into_iter().collect();
    let fetched = map_ordered(unique, limit, |id| async move {
        let detail = match kind {
            ArtifactKind::Package => client.package(id).await,
            ArtifactKind::Script => client.script(id).await,
        };
        (id, detail)
    })
    .await;

    let mut table = MetadataTable::new();
    for (id, detail) in fetched {
        match detail {
            Ok(detail) => table.insert(id, Ok(detail.into())),
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                tracing::debug!("{} {id} detail failed: {err}", kind.as_label());
                table.insert(id, Err(LookupFailure::from(&err)));
            }
        }
    }
    Ok(table)
}
