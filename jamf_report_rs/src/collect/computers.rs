//! The computers sheet.

use std::collections::{BTreeSet, HashMap};

use report_common::{Cell, ReportRow};

use crate::api::models::{Computer, ComputerGroup, LdapUser, LocalAccount};
use crate::api::{JamfClient, Transport};
use crate::config::ComputersSection;
use crate::error::{ApiError, recover};
use crate::pool::map_ordered;
use crate::report::{COMPUTERS_SHEET, Table};

use super::lookup_each;

/// Which computers the sheet covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputerFilter {
    All,
    Computer(i64),
    SmartGroup(i64),
}

impl ComputerFilter {
    pub fn from_section(section: &ComputersSection) -> Self {
        match (section.computer_id, section.smart_group_id) {
            (Some(id), _) => ComputerFilter::Computer(id),
            (None, Some(group)) => ComputerFilter::SmartGroup(group),
            (None, None) => ComputerFilter::All,
        }
    }
}

/// Lookups shared by every computer's rows.
#[derive(Debug, Default)]
pub struct ComputerContext {
    /// `(id, name)` of the smart group used as filter.
    pub smart_group: Option<(i64, String)>,
    pub groups: HashMap<String, ComputerGroup>,
    pub profiles: HashMap<i64, String>,
    /// Account name -> LDAP matches. Absent when the lookup failed.
    pub ldap: HashMap<String, Vec<LdapUser>>,
    pub ldap_enabled: bool,
}

fn is_reported_account(account: &LocalAccount, ignored: &[String]) -> bool {
    !account.name.starts_with('_')
        && !account.name.starts_with('/')
        && !ignored.iter().any(|name| *name == account.name)
}

fn row(computer: &Computer, kind: &str) -> ReportRow {
    ReportRow::new()
        .with("Type", kind)
        .with("Computer ID", computer.general.id)
        .with("Computer Name", &computer.general.name)
}

/// Rows for one computer: the info row, then each enabled section.
pub fn computer_rows(
    computer: &Computer,
    section: &ComputersSection,
    context: &ComputerContext,
) -> Vec<ReportRow> {
    let general = &computer.general;
    let mut info = ReportRow::new();
    if let Some((group_id, group_name)) = &context.smart_group {
        info.set("Computer SmartGroup ID", *group_id);
        info.set("Computer SmartGroup Name", group_name);
    }
    info.set("Type", "Computer Info");
    info.set("Computer ID", general.id);
    info.set("Computer Name", &general.name);
    info.set("Computer Serial Number", &general.serial_number);
    info.set("Computer Last Check-in", &general.last_contact_time);
    info.set("Computer Site Info", &general.site.name);
    let mut rows = vec![info];

    if section.hardware {
        let hardware = &computer.hardware;
        rows.push(
            row(computer, "Computer Hardware Info")
                .with("Computer Make", &hardware.make)
                .with("Computer Model", &hardware.model)
                .with("Computer Model Identifier", &hardware.model_identifier)
                .with("Computer OS Name", &hardware.os_name)
                .with("Computer OS Version", &hardware.os_version)
                .with("Computer OS Build", &hardware.os_build),
        );
    }

    if section.filevault {
        for user in &computer.hardware.filevault2_users {
            rows.push(
                row(computer, "Computer Hardware FileVault2 Info")
                    .with("Computer FileVault2 User", user),
            );
        }
    }

    if section.local_accounts {
        let accounts = computer
            .groups_accounts
            .local_accounts
            .iter()
            .filter(|account| is_reported_account(account, &section.ignored_accounts));
        for account in accounts {
            let mut uid = Cell::id_like(&account.uid);
            let mut in_ldap = Cell::Empty;
            if context.ldap_enabled {
                if let Some(users) = context.ldap.get(&account.name) {
                    in_ldap = Cell::from(if users.is_empty() { "false" } else { "true" });
                    if let Some(user) = users.first() {
                        uid = Cell::id_like(&user.uid_text());
                    }
                }
            }
            rows.push(
                row(computer, "Computer Hardware Local Account Info")
                    .with("Computer Local Account Name", &account.name)
                    .with("Computer Local Account Real Name", &account.realname)
                    .with("Computer Local Account ID", uid)
                    .with("Computer Local Account is Admin", account.administrator)
                    .with("Computer Local Account in LDAP", in_ldap),
            );
        }
    }

    if section.group_membership {
        for name in &computer.groups_accounts.computer_group_memberships {
            let Some(group) = context.groups.get(name) else {
                continue;
            };
            rows.push(
                row(computer, "Computer Group Membership Info")
                    .with("Computer Group Membership Group ID", group.id)
                    .with("Computer Group Membership Group Name", &group.name)
                    .with("Computer Group Membership Group Is Smart", group.is_smart),
            );
        }
    }

    if section.profile_membership {
        for profile in computer.configuration_profiles.iter().filter(|p| p.id > 0) {
            let Some(name) = context.profiles.get(&profile.id) else {
                continue;
            };
            rows.push(
                row(computer, "Computer Configuration Profile Membership Info")
                    .with("Computer Configuration Profile Membership ID", profile.id)
                    .with("Computer Configuration Profile Membership Name", name),
            );
        }
    }

    rows
}

/// Build the computers sheet.
///
/// Fails when the computer listing (or the filter group) cannot be read;
/// per-computer and per-lookup failures only drop their own rows.
pub async fn computers_table<T: Transport>(
    client: &JamfClient<T>,
    section: &ComputersSection,
    limit: usize,
) -> Result<Table, ApiError> {
    let mut context = ComputerContext {
        ldap_enabled: section.local_accounts && section.ldap_server.is_some(),
        ..ComputerContext::default()
    };

    let ids: Vec<i64> = match ComputerFilter::from_section(section) {
        ComputerFilter::Computer(id) => vec![id],
        ComputerFilter::SmartGroup(group_id) => {
            let group = client.computer_group(group_id).await?;
            let ids = group.computers.iter().map(|c| c.id).collect();
            context.smart_group = Some((group.id, group.name));
            ids
        }
        ComputerFilter::All => client.computers().await?.into_iter().map(|c| c.id).collect(),
    };
    tracing::debug!("reporting {} computers", ids.len());

    let details = map_ordered(ids, limit, |id| async move {
        recover(client.computer(id).await, &format!("computer {id}"))
    })
    .await;
    let mut computers = Vec::with_capacity(details.len());
    for detail in details {
        if let Some(computer) = detail? {
            computers.push(computer);
        }
    }

    if section.group_membership {
        let names: BTreeSet<String> = computers
            .iter()
            .flat_map(|c| c.groups_accounts.computer_group_memberships.iter().cloned())
            .collect();
        context.groups = lookup_each(names, limit, "computer group", |name| async move {
            client.computer_group_by_name(&name).await
        })
        .await?;
    }

    if section.profile_membership {
        let ids = computers
            .iter()
            .flat_map(|c| c.configuration_profiles.iter().map(|p| p.id))
            .filter(|id| *id > 0);
        context.profiles = lookup_each(ids, limit, "configuration profile", |id| async move {
            client
                .configuration_profile(id)
                .await
                .map(|profile| profile.general.name)
        })
        .await?;
    }

    if let (true, Some(server)) = (context.ldap_enabled, section.ldap_server.as_deref()) {
        let names: BTreeSet<String> = computers
            .iter()
            .flat_map(|c| c.groups_accounts.local_accounts.iter())
            .filter(|account| is_reported_account(account, &section.ignored_accounts))
            .map(|account| account.name.clone())
            .collect();
        context.ldap = lookup_each(names, limit, "LDAP user", |name| async move {
            match client.ldap_user(server, &name).await {
                Err(err) if err.is_not_found() => Ok(Vec::new()),
                other => other,
            }
        })
        .await?;
    }

    let mut table = Table::new(COMPUTERS_SHEET);
    for computer in &computers {
        for row in computer_rows(computer, section, &context) {
            table.push(row);
        }
    }
    Ok(table)
}
