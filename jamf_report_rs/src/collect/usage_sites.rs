//! Usage-site catalogs: which policies reference which artifact.

use report_common::{ArtifactKind, SiteKind};

use crate::api::models::{PatchSoftwareTitle, Policy, PreStage};
use crate::api::{JamfClient, Transport};
use crate::error::ApiError;
use crate::pool::map_ordered;
use crate::usage::{SiteCatalogs, SiteId, UsageSite};

use super::{Gathered, Lookups, lookup_tallied, tally};

/// List every policy and fetch its detail record.
///
/// A listing failure is returned to the caller. Details that fail are
/// skipped and counted in [`Gathered::unreadable`], so the result can be
/// shorter than the listing.
pub async fn fetch_policy_details<T: Transport>(
    client: &JamfClient<T>,
    limit: usize,
) -> Result<Gathered<Policy>, ApiError> {
    let listed = client.policies().await?;
    tracing::debug!("listed {} policies", listed.len());

    let details = map_ordered(listed, limit, |entry| async move {
        let what = format!("policy {} ({})", entry.id, entry.name);
        (what, client.policy(entry.id).await)
    })
    .await;

    let mut unreadable = 0;
    let mut policies = Vec::with_capacity(details.len());
    for (what, detail) in details {
        if let Some(policy) = tally(detail, &what, &mut unreadable)? {
            policies.push(policy);
        }
    }
    Ok(Gathered {
        records: policies,
        unreadable,
    })
}

/// One site per package (or script) reference in each policy.
pub fn regular_sites(policies: &[Policy], kind: ArtifactKind) -> Vec<UsageSite> {
    let mut sites = Vec::new();
    for policy in policies {
        let references = match kind {
            ArtifactKind::Package => &policy.package_configuration.packages,
            ArtifactKind::Script => &policy.scripts,
        };
        for reference in references {
            sites.push(UsageSite::new(
                SiteKind::RegularPolicy,
                SiteId::Int(policy.general.id),
                &policy.general.name,
                reference.id.to_string(),
            ));
        }
    }
    sites
}

/// One site per custom package id in each pre-stage enrollment.
pub fn prestage_sites(prestages: &[PreStage]) -> Vec<UsageSite> {
    prestages
        .iter()
        .flat_map(|prestage| {
            prestage.custom_package_ids.iter().map(|package_id| {
                UsageSite::new(
                    SiteKind::PreStagePolicy,
                    SiteId::Text(prestage.id.clone()),
                    &prestage.display_name,
                    package_id.as_str(),
                )
            })
        })
        .collect()
}

/// Patch policies resolved through their software titles.
///
/// Each patch policy points at a title; every title version with an attached
/// package becomes a site carrying that version. Titles are fetched once
/// however many patch policies share them. Patch policies and titles that
/// could not be read are counted in [`Gathered::unreadable`].
pub async fn patch_sites<T: Transport>(
    client: &JamfClient<T>,
    limit: usize,
) -> Result<Gathered<UsageSite>, ApiError> {
    let listed = client.patch_policies().await?;
    tracing::debug!("listed {} patch policies", listed.len());

    let details = map_ordered(listed, limit, |entry| async move {
        (entry.id, client.patch_policy(entry.id).await)
    })
    .await;

    let mut unreadable = 0;
    let mut resolved = Vec::with_capacity(details.len());
    for (policy_id, detail) in details {
        let what = format!("patch policy {policy_id}");
        if let Some(policy) = tally(detail, &what, &mut unreadable)? {
            resolved.push((policy_id, policy.software_title_configuration_id));
        }
    }

    let titles: Lookups<i64, PatchSoftwareTitle> = lookup_tallied(
        resolved.iter().map(|(_, title_id)| *title_id),
        limit,
        "patch software title",
        |title_id| client.patch_software_title(title_id),
    )
    .await?;
    unreadable += titles.unreadable;

    let mut sites = Vec::new();
    for (policy_id, title_id) in resolved {
        let Some(title) = titles.found.get(&title_id) else {
            continue;
        };
        for version in &title.versions {
            if let Some(package_id) = version.package_id() {
                sites.push(
                    UsageSite::new(
                        SiteKind::PatchManagementPolicy,
                        SiteId::Int(policy_id),
                        &title.name,
                        package_id.to_string(),
                    )
                    .with_software_version(&version.software_version),
                );
            }
        }
    }
    Ok(Gathered {
        records: sites,
        unreadable,
    })
}

/// Assemble the catalogs for one artifact kind.
///
/// Regular policies are always enabled. Pre-stage and patch catalogs are
/// only passed for packages, and only when their listings succeeded.
pub fn usage_catalogs(
    kind: ArtifactKind,
    policies: &[Policy],
    prestages: Option<&[PreStage]>,
    patch: Option<Vec<UsageSite>>,
) -> SiteCatalogs {
    let mut catalogs = SiteCatalogs::new();
    catalogs.enable(SiteKind::RegularPolicy, regular_sites(policies, kind));
    if let Some(prestages) = prestages {
        catalogs.enable(SiteKind::PreStagePolicy, prestage_sites(prestages));
    }
    if let Some(patch) = patch {
        catalogs.enable(SiteKind::PatchManagementPolicy, patch);
    }
    catalogs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeTransport;
    use serde_json::json;

    fn policy(id: i64, name: &str, packages: &[i64], scripts: &[i64]) -> Policy {
        let packages: Vec<_> = packages
            .iter()
            .map(|p| json!({ "id": p, "name": format!("pkg {p}") }))
            .collect();
        let scripts: Vec<_> = scripts
            .iter()
            .map(|s| json!({ "id": s, "name": format!("script {s}") }))
            .collect();
        serde_json::from_value(json!({
            "general": { "id": id, "name": name },
            "package_configuration": { "packages": packages },
            "scripts": scripts
        }))
        .unwrap()
    }

    #[test]
    fn regular_sites_follow_policy_and_reference_order() {
        let policies = vec![
            policy(10, "Deploy", &[1, 3], &[7]),
            policy(11, "Update", &[1], &[]),
        ];

        let packages = regular_sites(&policies, ArtifactKind::Package);
        let refs: Vec<(String, &str)> = packages
            .iter()
            .map(|s| (s.site_id.to_string(), s.artifact_id.as_str()))
            .collect();
        assert_eq!(
            refs,
            vec![
                ("10".to_string(), "1"),
                ("10".to_string(), "3"),
                ("11".to_string(), "1")
            ]
        );

        let scripts = regular_sites(&policies, ArtifactKind::Script);
        assert_eq!(scripts.len(), 1);
        assert_eq!(scripts[0].artifact_id, "7");
        assert_eq!(scripts[0].kind, SiteKind::RegularPolicy);
    }

    #[test]
    fn prestage_sites_keep_string_ids() {
        let prestages = vec![PreStage {
            id: "3".into(),
            display_name: "Staff Macs".into(),
            custom_package_ids: vec!["5".into(), "05".into()],
        }];

        let sites = prestage_sites(&prestages);
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0].site_id, SiteId::Text("3".into()));
        assert_eq!(sites[1].artifact_id, "05");
        assert_eq!(sites[0].site_name, "Staff Macs");
    }

    #[tokio::test]
    async fn patch_sites_skip_versions_without_package() {
        let fake = FakeTransport::new()
            .json(
                "/JSSResource/patchpolicies",
                json!({ "patch_policies": [ { "id": 20, "name": "Chrome Patch" }, { "id": 21, "name": "Chrome Beta" } ] }),
            )
            .json(
                "/JSSResource/patchpolicies/id/20",
                json!({ "patch_policy": { "software_title_configuration_id": 4 } }),
            )
            .json(
                "/JSSResource/patchpolicies/id/21",
                json!({ "patch_policy": { "software_title_configuration_id": 4 } }),
            )
            .json(
                "/JSSResource/patchsoftwaretitles/id/4",
                json!({ "patch_software_title": {
                    "name": "Google Chrome",
                    "versions": [
                        { "software_version": "120.0", "package": { "id": 1, "name": "chrome-120.pkg" } },
                        { "software_version": "119.0", "package": null },
                        { "software_version": "118.0", "package": { "id": -1, "name": "None" } }
                    ]
                }}),
            );
        let client = JamfClient::new(fake);

        let gathered = patch_sites(&client, 4).await.unwrap();
        assert!(gathered.is_complete());
        let sites = gathered.records;

        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0].site_id, SiteId::Int(20));
        assert_eq!(sites[0].site_name, "Google Chrome");
        assert_eq!(sites[0].artifact_id, "1");
        assert_eq!(sites[0].software_version.as_deref(), Some("120.0"));
        assert_eq!(sites[1].site_id, SiteId::Int(21));
        assert_eq!(
            client
                .transport()
                .call_count("/JSSResource/patchsoftwaretitles/id/4"),
            1
        );
    }

    #[tokio::test]
    async fn failed_policy_detail_is_counted_as_unreadable() {
        let fake = FakeTransport::new()
            .json(
                "/JSSResource/policies",
                json!({ "policies": [
                    { "id": 1, "name": "A" },
                    { "id": 2, "name": "B" },
                    { "id": 3, "name": "C" }
                ]}),
            )
            .json(
                "/JSSResource/policies/id/1",
                json!({ "policy": { "general": { "id": 1, "name": "A" } } }),
            )
            .unavailable("/JSSResource/policies/id/2")
            .not_found("/JSSResource/policies/id/3");
        let client = JamfClient::new(fake);

        let details = fetch_policy_details(&client, 2).await.unwrap();
        assert_eq!(details.records.len(), 1);
        assert_eq!(details.records[0].general.name, "A");
        // policy 3 was deleted after the listing, policy 2 is genuinely missing
        assert_eq!(details.unreadable, 1);
        assert!(!details.is_complete());
    }

    #[tokio::test]
    async fn unreadable_patch_title_leaves_catalog_incomplete() {
        let fake = FakeTransport::new()
            .json(
                "/JSSResource/patchpolicies",
                json!({ "patch_policies": [ { "id": 20, "name": "Chrome" }, { "id": 21, "name": "Zoom" } ] }),
            )
            .json(
                "/JSSResource/patchpolicies/id/20",
                json!({ "patch_policy": { "software_title_configuration_id": 4 } }),
            )
            .unavailable("/JSSResource/patchpolicies/id/21")
            .unavailable("/JSSResource/patchsoftwaretitles/id/4");
        let client = JamfClient::new(fake);

        let gathered = patch_sites(&client, 2).await.unwrap();
        assert!(gathered.records.is_empty());
        assert_eq!(gathered.unreadable, 2);
    }

    #[tokio::test]
    async fn policy_listing_failure_is_returned() {
        let fake = FakeTransport::new().unavailable("/JSSResource/policies");
        let client = JamfClient::new(fake);
        assert!(fetch_policy_details(&client, 2).await.is_err());
    }

    #[test]
    fn catalogs_enable_kinds_in_order() {
        let policies = vec![policy(10, "Deploy", &[1], &[])];
        let prestages = vec![PreStage {
            id: "3".into(),
            display_name: "Lab".into(),
            custom_package_ids: vec!["1".into()],
        }];

        let catalogs = usage_catalogs(ArtifactKind::Package, &policies, Some(&prestages), None);
        let kinds: Vec<SiteKind> = catalogs.kinds().collect();
        assert_eq!(kinds, vec![SiteKind::RegularPolicy, SiteKind::PreStagePolicy]);
        assert_eq!(catalogs.total_sites(), 2);
    }
}
