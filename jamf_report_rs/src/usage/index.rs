//! Per-kind lookup from artifact id to the sites that reference it.

use std::collections::HashMap;

use report_common::SiteKind;

use super::{SiteCatalogs, UsageSite};

/// Index over fully materialised site catalogs.
///
/// Borrows the catalogs; build it right before the row pass and drop it
/// afterwards. Keys are the artifact id strings exactly as recorded by the
/// site, so `"01"` and `"1"` are different keys.
#[derive(Debug)]
pub struct UsageIndex<'a> {
    kinds: Vec<(SiteKind, HashMap<&'a str, Vec<&'a UsageSite>>)>,
}

impl<'a> UsageIndex<'a> {
    pub fn build(catalogs: &'a SiteCatalogs) -> Self {
        let kinds = catalogs
            .iter()
            .map(|(kind, sites)| {
                let mut by_artifact: HashMap<&'a str, Vec<&'a UsageSite>> = HashMap::new();
                for site in sites {
                    by_artifact
                        .entry(site.artifact_id.as_str())
                        .or_default()
                        .push(site);
                }
                (kind, by_artifact)
            })
            .collect();
        Self { kinds }
    }

    /// Sites of one kind referencing `artifact_id`, in encounter order.
    pub fn matches(&self, kind: SiteKind, artifact_id: &str) -> &[&'a UsageSite] {
        self.kinds
            .iter()
            .find(|(k, _)| *k == kind)
            .and_then(|(_, map)| map.get(artifact_id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All matching sites across every enabled kind, kinds in enablement order.
    pub fn sites_for(&self, artifact_id: &str) -> Vec<&'a UsageSite> {
        self.kinds
            .iter()
            .filter_map(|(_, map)| map.get(artifact_id))
            .flat_map(|sites| sites.iter().copied())
            .collect()
    }

    pub fn is_used(&self, artifact_id: &str) -> bool {
        self.kinds
            .iter()
            .any(|(_, map)| map.contains_key(artifact_id))
    }

    pub fn kinds(&self) -> impl Iterator<Item = SiteKind> + '_ {
        self.kinds.iter().map(|(kind, _)| *kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::SiteId;

    fn site(kind: SiteKind, id: i64, name: &str, artifact: &str) -> UsageSite {
        UsageSite::new(kind, SiteId::Int(id), name, artifact)
    }

    #[test]
    fn preserves_multi_site_and_multi_artifact_references() {
        let mut catalogs = SiteCatalogs::new();
        catalogs.enable(
            SiteKind::RegularPolicy,
            vec![
                site(SiteKind::RegularPolicy, 10, "Deploy", "1"),
                site(SiteKind::RegularPolicy, 10, "Deploy", "2"),
                site(SiteKind::RegularPolicy, 11, "Update", "1"),
            ],
        );
        let index = UsageIndex::build(&catalogs);

        let names: Vec<&str> = index
            .matches(SiteKind::RegularPolicy, "1")
            .iter()
            .map(|s| s.site_name.as_str())
            .collect();
        assert_eq!(names, vec!["Deploy", "Update"]);
        assert_eq!(index.matches(SiteKind::RegularPolicy, "2").len(), 1);
    }

    #[test]
    fn ids_match_as_exact_strings() {
        let mut catalogs = SiteCatalogs::new();
        catalogs.enable(
            SiteKind::RegularPolicy,
            vec![site(SiteKind::RegularPolicy, 10, "Deploy", "01")],
        );
        let index = UsageIndex::build(&catalogs);

        assert!(index.is_used("01"));
        assert!(!index.is_used("1"));
        assert!(index.sites_for("1").is_empty());
    }

    #[test]
    fn sites_for_follows_enablement_order() {
        let mut catalogs = SiteCatalogs::new();
        catalogs.enable(
            SiteKind::PreStagePolicy,
            vec![UsageSite::new(
                SiteKind::PreStagePolicy,
                SiteId::Text("PS-1".into()),
                "Enrollment",
                "3",
            )],
        );
        catalogs.enable(
            SiteKind::RegularPolicy,
            vec![site(SiteKind::RegularPolicy, 20, "Deploy", "3")],
        );
        let index = UsageIndex::build(&catalogs);

        let kinds: Vec<SiteKind> = index.sites_for("3").iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![SiteKind::PreStagePolicy, SiteKind::RegularPolicy]);
        assert!(
            index
                .matches(SiteKind::PatchManagementPolicy, "3")
                .is_empty()
        );
    }
}
