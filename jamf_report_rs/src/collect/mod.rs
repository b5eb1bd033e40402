//! Collection walkers.
//!
//! Everything that talks to the server before the report is assembled lives
//! here: usage-site catalogs, artifact metadata, and the computer, policy and
//! configuration-profile sheets. Walkers fan out with [`map_ordered`], keep
//! results in listing order, and skip single records that fail. Only
//! [`ApiError::Auth`] escapes a walker once its listing call succeeded.

mod artifacts;
mod computers;
mod policies;
mod profiles;
mod usage_sites;

use std::collections::{BTreeSet, HashMap};
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;

use report_common::Cell;

use crate::api::models::{ComputerGroup, Scope};
use crate::api::{JamfClient, Transport};
use crate::error::{ApiError, recover};
use crate::pool::map_ordered;

pub use artifacts::{fetch_metadata, list_artifacts};
pub use computers::{ComputerContext, ComputerFilter, computer_rows, computers_table};
pub use policies::{PolicyLookups, policies_table, policy_rows, referenced_artifacts};
pub use profiles::{profile_rows, profiles_table};
pub use usage_sites::{
    fetch_policy_details, patch_sites, prestage_sites, regular_sites, usage_catalogs,
};

/// Records a walker read, and how many it could not.
///
/// A record that answered `NotFound` was deleted after the listing and is not
/// counted. Any other skipped failure leaves the collection short, so
/// anything derived from it may be missing entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gathered<T> {
    pub records: Vec<T>,
    pub unreadable: usize,
}

impl<T> Gathered<T> {
    pub fn is_complete(&self) -> bool {
        self.unreadable == 0
    }
}

/// [`recover`] that also counts the failures that were not a deletion.
pub(crate) fn tally<T>(
    result: Result<T, ApiError>,
    what: &str,
    unreadable: &mut usize,
) -> Result<Option<T>, ApiError> {
    let deleted = matches!(&result, Err(err) if err.is_not_found());
    let kept = recover(result, what)?;
    if kept.is_none() && !deleted {
        *unreadable += 1;
    }
    Ok(kept)
}

/// Distinct-key lookups that succeeded, plus the count that failed for a
/// reason other than `NotFound`.
#[derive(Debug)]
pub(crate) struct Lookups<K, V> {
    pub found: HashMap<K, V>,
    pub unreadable: usize,
}

/// Fetch every distinct key once and keep the lookups that succeeded.
///
/// Failed lookups are logged and counted. `what` names the record kind in
/// log lines ("computer group").
pub(crate) async fn lookup_tallied<K, V, F, Fut>(
    keys: impl IntoIterator<Item = K>,
    limit: usize,
    what: &str,
    fetch: F,
) -> Result<Lookups<K, V>, ApiError>
where
    K: Ord + Hash + Clone + Display,
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<V, ApiError>>,
{
    let unique: BTreeSet<K> = keys.into_iter().collect();
    let fetched = map_ordered(unique, limit, |key| {
        let pending = fetch(key.clone());
        async move { (key, pending.await) }
    })
    .await;

    let mut lookups = Lookups {
        found: HashMap::with_capacity(fetched.len()),
        unreadable: 0,
    };
    for (key, result) in fetched {
        if let Some(value) = tally(result, &format!("{what} {key}"), &mut lookups.unreadable)? {
            lookups.found.insert(key, value);
        }
    }
    Ok(lookups)
}

/// [`lookup_tallied`] for callers that render a failed lookup as an empty
/// cell and have no use for the count.
pub(crate) async fn lookup_each<K, V, F, Fut>(
    keys: impl IntoIterator<Item = K>,
    limit: usize,
    what: &str,
    fetch: F,
) -> Result<HashMap<K, V>, ApiError>
where
    K: Ord + Hash + Clone + Display,
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<V, ApiError>>,
{
    Ok(lookup_tallied(keys, limit, what, fetch).await?.found)
}

/// Resolve computer groups by id, once per distinct id.
pub(crate) async fn lookup_groups<T: Transport>(
    client: &JamfClient<T>,
    ids: impl IntoIterator<Item = i64>,
    limit: usize,
) -> Result<HashMap<i64, ComputerGroup>, ApiError> {
    lookup_each(ids, limit, "computer group", |id| client.computer_group(id)).await
}

/// `is_smart` of a scoped group, empty when the group could not be read.
pub(crate) fn group_is_smart(groups: &HashMap<i64, ComputerGroup>, id: i64) -> Cell {
    groups
        .get(&id)
        .map(|group| Cell::from(group.is_smart))
        .unwrap_or_default()
}

/// Group ids referenced by target and exclusion scopes.
pub(crate) fn scoped_group_ids<'a>(
    scopes: impl IntoIterator<Item = &'a Scope>,
    targets: bool,
    exclusions: bool,
) -> BTreeSet<i64> {
    let mut ids = BTreeSet::new();
    for scope in scopes {
        if targets {
            ids.extend(scope.computer_groups.iter().map(|g| g.id));
        }
        if exclusions {
            ids.extend(scope.exclusions.computer_groups.iter().map(|g| g.id));
        }
    }
    ids
}
