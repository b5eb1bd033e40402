//! The policies sheet.

use std::collections::{BTreeSet, HashMap};

use report_common::{ArtifactKind, Cell, ReportRow};

use crate::api::models::{ComputerGroup, NamedRef, Policy};
use crate::api::{JamfClient, Transport};
use crate::config::PoliciesSection;
use crate::error::ApiError;
use crate::report::{POLICIES_SHEET, Table};
use crate::usage::MetadataTable;

use super::{fetch_metadata, group_is_smart, lookup_groups, scoped_group_ids};

/// Artifact ids referenced by any policy.
pub fn referenced_artifacts(policies: &[Policy], kind: ArtifactKind) -> BTreeSet<i64> {
    policies
        .iter()
        .flat_map(|policy| match kind {
            ArtifactKind::Package => policy.package_configuration.packages.iter(),
            ArtifactKind::Script => policy.scripts.iter(),
        })
        .map(|reference| reference.id)
        .collect()
}

/// Resolved records the policy rows are enriched with.
#[derive(Debug, Default)]
pub struct PolicyLookups {
    pub groups: HashMap<i64, ComputerGroup>,
    pub packages: MetadataTable,
    pub scripts: MetadataTable,
}

fn row(policy: &Policy, kind: &str) -> ReportRow {
    let general = &policy.general;
    ReportRow::new()
        .with("Type", kind)
        .with("Policy ID", general.id)
        .with("Policy Name", &general.name)
        .with("Policy Category ID", general.category.id)
        .with("Policy Category Name", &general.category.name)
}

/// Artifact row columns, falling back to the scoped name when the detail
/// record could not be read.
fn artifact_row(
    policy: &Policy,
    kind: ArtifactKind,
    reference: &NamedRef,
    metadata: &MetadataTable,
) -> ReportRow {
    let (type_label, prefix) = match kind {
        ArtifactKind::Package => ("Policy Package", "Policy Package"),
        ArtifactKind::Script => ("Policy Scripts", "Policy Script"),
    };
    let (name, category, filename) = match metadata.lookup(reference.id) {
        Ok(meta) => (
            meta.name.clone(),
            Cell::from(&meta.category),
            Cell::from(&meta.filename),
        ),
        Err(_) => (reference.name.clone(), Cell::Empty, Cell::Empty),
    };
    row(policy, type_label)
        .with(format!("{prefix} ID"), reference.id)
        .with(format!("{prefix} Name"), name)
        .with(format!("{prefix} Category Name"), category)
        .with(format!("{prefix} Filename"), filename)
}

/// Rows for one policy: the `Policy` row, then each enabled section.
pub fn policy_rows(
    policy: &Policy,
    section: &PoliciesSection,
    lookups: &PolicyLookups,
) -> Vec<ReportRow> {
    let mut rows = vec![row(policy, "Policy")];

    let self_service = &policy.self_service;
    if section.self_service && self_service.use_for_self_service {
        rows.push(
            row(policy, "Policy Self Service Info")
                .with("Policy In SelfService", true)
                .with(
                    "Policy In SelfService Name",
                    &self_service.self_service_display_name,
                ),
        );
    }

    let scope = &policy.scope;
    if section.targets {
        if scope.all_computers && scope.computers.is_empty() {
            rows.push(
                row(policy, "Policy Computer Targets").with("Policy Target All Computers", true),
            );
        }
        for computer in &scope.computers {
            rows.push(
                row(policy, "Policy Computer Targets")
                    .with("Policy Target All Computers", scope.all_computers)
                    .with("Policy Target Computer ID", computer.id)
                    .with("Policy Target Computer Name", &computer.name),
            );
        }
        for group in &scope.computer_groups {
            rows.push(
                row(policy, "Policy Computer Target Group")
                    .with("Policy Target Group ID", group.id)
                    .with("Policy Target Group Name", &group.name)
                    .with(
                        "Policy Target Group is Smart",
                        group_is_smart(&lookups.groups, group.id),
                    ),
            );
        }
    }

    if section.exclusions {
        for computer in &scope.exclusions.computers {
            rows.push(
                row(policy, "Policy Computer Exclusions")
                    .with("Policy Exclusion Computer ID", computer.id)
                    .with("Policy Exclusion Computer Name", &computer.name),
            );
        }
        for group in &scope.exclusions.computer_groups {
            rows.push(
                row(policy, "Policy Computer Exclusions Group")
                    .with("Policy Exclusion Group id", group.id)
                    .with("Policy Exclusion Group Name", &group.name)
                    .with(
                        "Policy Exclusion Group is Smart",
                        group_is_smart(&lookups.groups, group.id),
                    ),
            );
        }
    }

    if section.packages {
        for package in &policy.package_configuration.packages {
            rows.push(artifact_row(policy, ArtifactKind::Package, package, &lookups.packages));
        }
    }
    if section.scripts {
        for script in &policy.scripts {
            rows.push(artifact_row(policy, ArtifactKind::Script, script, &lookups.scripts));
        }
    }

    rows
}

/// Build the policies sheet from already fetched policy details.
///
/// `packages` / `scripts` are reused when the usage sheets already fetched
/// the full metadata; otherwise only the referenced ids are looked up.
pub async fn policies_table<T: Transport>(
    client: &JamfClient<T>,
    policies: &[Policy],
    section: &PoliciesSection,
    packages: Option<&MetadataTable>,
    scripts: Option<&MetadataTable>,
    limit: usize,
) -> Result<Table, ApiError> {
    let mut lookups = PolicyLookups {
        groups: lookup_groups(
            client,
            scoped_group_ids(
                policies.iter().map(|p| &p.scope),
                section.targets,
                section.exclusions,
            ),
            limit,
        )
        .await?,
        ..PolicyLookups::default()
    };

    if section.packages {
        lookups.packages = match packages {
            Some(table) => table.clone(),
            None => {
                let ids = referenced_artifacts(policies, ArtifactKind::Package);
                fetch_metadata(client, ArtifactKind::Package, ids, limit).await?
            }
        };
    }
    if section.scripts {
        lookups.scripts = match scripts {
            Some(table) => table.clone(),
            None => {
                let ids = referenced_artifacts(policies, ArtifactKind::Script);
                fetch_metadata(client, ArtifactKind::Script, ids, limit).await?
            }
        };
    }

    let mut table = Table::new(POLICIES_SHEET);
    for policy in policies {
        for row in policy_rows(policy, section, &lookups) {
            table.push(row);
        }
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeTransport;
    use crate::usage::ArtifactMeta;
    use serde_json::json;

    fn deploy_policy() -> Policy {
        serde_json::from_value(json!({
            "general": { "id": 7, "name": "Deploy Chrome", "category": { "id": 2, "name": "Browsers" } },
            "self_service": { "use_for_self_service": true, "self_service_display_name": "Chrome" },
            "scope": {
                "all_computers": false,
                "computers": [ { "id": 1, "name": "mac-1" } ],
                "computer_groups": [ { "id": 4, "name": "Staff" } ],
                "exclusions": {
                    "computers": [ { "id": 9, "name": "kiosk" } ],
                    "computer_groups": [ { "id": 5, "name": "Lab" } ]
                }
            },
            "package_configuration": { "packages": [ { "id": 1, "name": "Chrome" } ] },
            "scripts": [ { "id": 3, "name": "cleanup.sh" } ]
        }))
        .unwrap()
    }

    fn types(rows: &[ReportRow]) -> Vec<String> {
        rows.iter()
            .map(|r| r.get("Type").map(Cell::to_text).unwrap_or_default())
            .collect()
    }

    #[test]
    fn every_section_in_order() {
        let lookups = PolicyLookups {
            packages: vec![ArtifactMeta::new(1, "Chrome", "chrome.pkg").with_category("Browsers")]
                .into_iter()
                .collect(),
            ..PolicyLookups::default()
        };

        let rows = policy_rows(&deploy_policy(), &PoliciesSection::default(), &lookups);

        assert_eq!(
            types(&rows),
            vec![
                "Policy",
                "Policy Self Service Info",
                "Policy Computer Targets",
                "Policy Computer Target Group",
                "Policy Computer Exclusions",
                "Policy Computer Exclusions Group",
                "Policy Package",
                "Policy Scripts",
            ]
        );
        for row in &rows {
            assert_eq!(row.get("Policy ID"), Some(&Cell::Int(7)));
            assert_eq!(row.get("Policy Category Name"), Some(&Cell::from("Browsers")));
        }
        assert_eq!(rows[6].get("Policy Package Filename"), Some(&Cell::from("chrome.pkg")));
        // unresolved script keeps its scoped name
        assert_eq!(rows[7].get("Policy Script Name"), Some(&Cell::from("cleanup.sh")));
        assert_eq!(rows[7].get("Policy Script Filename"), Some(&Cell::Empty));
        assert_eq!(rows[3].get("Policy Target Group is Smart"), Some(&Cell::Empty));
    }

    #[test]
    fn all_computers_without_explicit_targets() {
        let policy: Policy = serde_json::from_value(json!({
            "general": { "id": 8, "name": "Inventory" },
            "scope": { "all_computers": true }
        }))
        .unwrap();
        let rows = policy_rows(&policy, &PoliciesSection::default(), &PolicyLookups::default());
        assert_eq!(types(&rows), vec!["Policy", "Policy Computer Targets"]);
        assert_eq!(
            rows[1].get("Policy Target All Computers"),
            Some(&Cell::from("True"))
        );
    }

    #[test]
    fn disabled_sections_are_left_out() {
        let section = PoliciesSection {
            self_service: false,
            targets: false,
            exclusions: false,
            packages: false,
            scripts: false,
            ..PoliciesSection::default()
        };
        let rows = policy_rows(&deploy_policy(), &section, &PolicyLookups::default());
        assert_eq!(types(&rows), vec!["Policy"]);
    }

    #[tokio::test]
    async fn table_fetches_only_referenced_artifacts() {
        let fake = FakeTransport::new()
            .json(
                "/JSSResource/computergroups/id/4",
                json!({ "computer_group": { "id": 4, "name": "Staff", "is_smart": false } }),
            )
            .json(
                "/JSSResource/computergroups/id/5",
                json!({ "computer_group": { "id": 5, "name": "Lab", "is_smart": true } }),
            )
            .json(
                "/JSSResource/scripts/id/3",
                json!({ "script": { "id": 3, "name": "cleanup.sh", "filename": "cleanup.sh", "category": "Maintenance" } }),
            );
        let client = JamfClient::new(fake);
        let packages: MetadataTable = vec![ArtifactMeta::new(1, "Chrome", "chrome.pkg")]
            .into_iter()
            .collect();

        let table = policies_table(
            &client,
            &[deploy_policy()],
            &PoliciesSection::default(),
            Some(&packages),
            None,
            4,
        )
        .await
        .unwrap();

        let rows = table.rows();
        assert_eq!(rows.len(), 8);
        assert_eq!(rows[5].get("Policy Exclusion Group is Smart"), Some(&Cell::from("True")));
        assert_eq!(rows[7].get("Policy Script Category Name"), Some(&Cell::from("Maintenance")));
        let calls = client.transport().calls();
        assert!(!calls.iter().any(|path| path.starts_with("/JSSResource/packages")));
        assert_eq!(client.transport().call_count("/JSSResource/scripts/id/3"), 1);
    }
}
