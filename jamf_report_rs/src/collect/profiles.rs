//! The macOS configuration profiles sheet.

use std::collections::HashMap;

use report_common::ReportRow;

use crate::api::models::{ComputerGroup, ConfigurationProfile};
use crate::api::{JamfClient, Transport};
use crate::config::ProfilesSection;
use crate::error::{ApiError, recover};
use crate::pool::map_ordered;
use crate::report::{PROFILES_SHEET, Table};

use super::{group_is_smart, lookup_groups, scoped_group_ids};

// This sheet names its type column "Configuration Profile Type", after the id.
fn row(profile: &ConfigurationProfile, kind: &str) -> ReportRow {
    let general = &profile.general;
    ReportRow::new()
        .with("Configuration Profile ID", general.id)
        .with("Configuration Profile Type", kind)
        .with("Configuration Profile Name", &general.name)
        .with("Configuration Profile Category ID", general.category.id)
        .with("Configuration Profile Category Name", &general.category.name)
}

pub fn profile_rows(
    profile: &ConfigurationProfile,
    section: &ProfilesSection,
    groups: &HashMap<i64, ComputerGroup>,
) -> Vec<ReportRow> {
    let mut rows = vec![row(profile, "Configuration Profile")];
    let scope = &profile.scope;

    if section.targets {
        for computer in &scope.computers {
            rows.push(
                row(profile, "Configuration Profile Target Computer")
                    .with("Configuration Profile Target Computer ID", computer.id)
                    .with("Configuration Profile Target Computer Name", &computer.name),
            );
        }
        for group in &scope.computer_groups {
            rows.push(
                row(profile, "Configuration Profile Target Computer Group")
                    .with("Configuration Profile Target Group ID", group.id)
                    .with("Configuration Profile Target Group Name", &group.name)
                    .with(
                        "Configuration Profile Target Group is Smart",
                        group_is_smart(groups, group.id),
                    ),
            );
        }
    }

    if section.exclusions {
        for computer in &scope.exclusions.computers {
            rows.push(
                row(profile, "Configuration Profile Exclusion Computers")
                    .with("Configuration Profile Exclusion Computer id", computer.id)
                    .with("Configuration Profile Exclusion Computer Name", &computer.name),
            );
        }
        for group in &scope.exclusions.computer_groups {
            rows.push(
                row(profile, "Configuration Profile Exclusion Computer Groups")
                    .with("Configuration Profile Exclusion Group id", group.id)
                    .with("Configuration Profile Exclusion Group Name", &group.name)
                    .with(
                        "Configuration Profile Exclusion Group is Smart",
                        group_is_smart(groups, group.id),
                    ),
            );
        }
    }

    rows
}

pub async fn profiles_table<T: Transport>(
    client: &JamfClient<T>,
    section: &ProfilesSection,
    limit: usize,
) -> Result<Table, ApiError> {
    let listed = client.configuration_profiles().await?;
    tracing::debug!("listed {} configuration profiles", listed.len());

    let details = map_ordered(listed, limit, |entry| async move {
        let what = format!("configuration profile {} ({})", entry.id, entry.name);
        recover(client.configuration_profile(entry.id).await, &what)
    })
    .await;
    let mut profiles = Vec::with_capacity(details.len());
    for detail in details {
        if let Some(profile) = detail? {
            profiles.push(profile);
        }
    }

    let group_ids = scoped_group_ids(
        profiles.iter().map(|p| &p.scope),
        section.targets,
        section.exclusions,
    );
    let groups = lookup_groups(client, group_ids, limit).await?;

    let mut table = Table::new(PROFILES_SHEET);
    for profile in &profiles {
        for row in profile_rows(profile, section, &groups) {
            table.push(row);
        }
    }
    Ok(table)
}
