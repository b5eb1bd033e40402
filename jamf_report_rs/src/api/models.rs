//! Wire payloads for the endpoints the report reads.
//!
//! Classic-API (`/JSSResource`) records wrap every object in a singular key
//! (`{"policy": {...}}`) and every collection in a plural one. Fields the
//! report cannot work without are required; everything else defaults, so a
//! missing required key surfaces as a decode error naming that field.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// `{ id, name }` pair used by listings and scope entries.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NamedRef {
    pub id: i64,
    pub name: String,
}

/// Category or site reference; either half may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LooseRef {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

// ---------------------------------------------------------------------------
// Packages & scripts
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct PackageList {
    pub packages: Vec<NamedRef>,
}

#[derive(Debug, Deserialize)]
pub struct ScriptList {
    pub scripts: Vec<NamedRef>,
}

/// Package or script detail. Both carry a plain-string category.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArtifactDetail {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Deserialize)]
pub struct PackageEnvelope {
    pub package: ArtifactDetail,
}

#[derive(Debug, Deserialize)]
pub struct ScriptEnvelope {
    pub script: ArtifactDetail,
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct PolicyList {
    pub policies: Vec<NamedRef>,
}

#[derive(Debug, Deserialize)]
pub struct PolicyEnvelope {
    pub policy: Policy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Policy {
    pub general: PolicyGeneral,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default)]
    pub self_service: SelfService,
    #[serde(default)]
    pub package_configuration: PackageConfiguration,
    #[serde(default)]
    pub scripts: Vec<NamedRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolicyGeneral {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub category: LooseRef,
}

/// Target and exclusion lists shared by policies and configuration profiles.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Scope {
    #[serde(default)]
    pub all_computers: bool,
    #[serde(default)]
    pub computers: Vec<NamedRef>,
    #[serde(default)]
    pub computer_groups: Vec<NamedRef>,
    #[serde(default)]
    pub exclusions: Exclusions,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Exclusions {
    #[serde(default)]
    pub computers: Vec<NamedRef>,
    #[serde(default)]
    pub computer_groups: Vec<NamedRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SelfService {
    #[serde(default)]
    pub use_for_self_service: bool,
    #[serde(default)]
    pub self_service_display_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageConfiguration {
    #[serde(default)]
    pub packages: Vec<NamedRef>,
}

// ---------------------------------------------------------------------------
// Pre-stage enrollments (Pro API)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreStagePage {
    pub total_count: u64,
    #[serde(default)]
    pub results: Vec<PreStage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreStage {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub custom_package_ids: Vec<String>,
}

// ---------------------------------------------------------------------------
// Patch management
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct PatchPolicyList {
    pub patch_policies: Vec<PatchPolicyRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatchPolicyRef {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct PatchPolicyEnvelope {
    pub patch_policy: PatchPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatchPolicy {
    pub software_title_configuration_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct PatchTitleEnvelope {
    pub patch_software_title: PatchSoftwareTitle,
}

/// Patch software title.
///
/// This endpoint's JSON is a direct rendering of its XML document, so the
/// version list can arrive flat (`"versions": [...]`) or still wrapped in its
/// XML element (`"versions": {"version": [...]}`, or a bare object when the
/// title has a single version). An empty element renders as `""` or `null`.
#[derive(Debug, Clone, Deserialize)]
pub struct PatchSoftwareTitle {
    pub name: String,
    #[serde(default, deserialize_with = "version_list")]
    pub versions: Vec<PatchVersion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatchVersion {
    pub software_version: String,
    #[serde(default, deserialize_with = "attached_package")]
    pub package: Option<PatchPackage>,
}

fn version_list<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<PatchVersion>, D::Error> {
    let items = match Value::deserialize(de)? {
        Value::Array(items) => items,
        Value::Object(mut element) if element.contains_key("version") => {
            match element.remove("version") {
                Some(Value::Array(items)) => items,
                Some(Value::Null) | None => Vec::new(),
                Some(single) => vec![single],
            }
        }
        Value::Null => Vec::new(),
        Value::String(text) if text.trim().is_empty() => Vec::new(),
        other => {
            return Err(D::Error::custom(format!(
                "unexpected patch title versions: {other}"
            )));
        }
    };
    items
        .into_iter()
        .map(|item| serde_json::from_value(item).map_err(D::Error::custom))
        .collect()
}

fn attached_package<'de, D: Deserializer<'de>>(de: D) -> Result<Option<PatchPackage>, D::Error> {
    match Value::deserialize(de)? {
        Value::Null => Ok(None),
        Value::String(text) if text.trim().is_empty() => Ok(None),
        other => serde_json::from_value(other).map(Some).map_err(D::Error::custom),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatchPackage {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

impl PatchVersion {
    /// Package id when a real package is attached. Unattached versions come
    /// back as `null` or with id `-1`.
    pub fn package_id(&self) -> Option<i64> {
        self.package.as_ref().map(|p| p.id).filter(|id| *id > 0)
    }
}

// ---------------------------------------------------------------------------
// Computers & groups
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ComputerList {
    pub computers: Vec<NamedRef>,
}

#[derive(Debug, Deserialize)]
pub struct ComputerEnvelope {
    pub computer: Computer,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Computer {
    pub general: ComputerGeneral,
    #[serde(default)]
    pub hardware: Hardware,
    #[serde(default)]
    pub groups_accounts: GroupsAccounts,
    #[serde(default)]
    pub configuration_profiles: Vec<ProfileRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComputerGeneral {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub serial_number: String,
    #[serde(default)]
    pub last_contact_time: String,
    #[serde(default)]
    pub site: LooseRef,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Hardware {
    #[serde(default)]
    pub make: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub model_identifier: String,
    #[serde(default)]
    pub os_name: String,
    #[serde(default)]
    pub os_version: String,
    #[serde(default)]
    pub os_build: String,
    #[serde(default)]
    pub filevault2_users: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupsAccounts {
    #[serde(default)]
    pub local_accounts: Vec<LocalAccount>,
    #[serde(default)]
    pub computer_group_memberships: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalAccount {
    pub name: String,
    #[serde(default)]
    pub realname: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub administrator: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileRef {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ComputerGroupEnvelope {
    pub computer_group: ComputerGroup,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComputerGroup {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub is_smart: bool,
    #[serde(default)]
    pub computers: Vec<NamedRef>,
}

// ---------------------------------------------------------------------------
// Configuration profiles
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ProfileList {
    pub os_x_configuration_profiles: Vec<NamedRef>,
}

#[derive(Debug, Deserialize)]
pub struct ProfileEnvelope {
    pub os_x_configuration_profile: ConfigurationProfile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfigurationProfile {
    pub general: ProfileGeneral,
    #[serde(default)]
    pub scope: Scope,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileGeneral {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub category: LooseRef,
}

// ---------------------------------------------------------------------------
// LDAP
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LdapUsers {
    #[serde(default)]
    pub ldap_users: Vec<LdapUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LdapUser {
    #[serde(default)]
    pub uid: Value,
    #[serde(default)]
    pub username: String,
}

impl LdapUser {
    /// LDAP uids come back as numbers or strings depending on the directory.
    pub fn uid_text(&self) -> String {
        match &self.uid {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    #[serde(default)]
    pub expires: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn policy_defaults_missing_sections() {
        let envelope: PolicyEnvelope = serde_json::from_value(json!({
            "policy": { "general": { "id": 5, "name": "Deploy" } }
        }))
        .unwrap();
        assert_eq!(envelope.policy.general.id, 5);
        assert!(envelope.policy.package_configuration.packages.is_empty());
        assert!(!envelope.policy.scope.all_computers);
    }

    #[test]
    fn missing_required_field_is_named() {
        let err = serde_json::from_value::<PackageEnvelope>(json!({
            "package": { "id": 4, "filename": "x.pkg" }
        }))
        .unwrap_err();
        assert!(err.to_string().contains("missing field `name`"));
    }

    #[test]
    fn patch_versions_without_real_package() {
        let title: PatchSoftwareTitle = serde_json::from_value(json!({
            "name": "Firefox",
            "versions": [
                { "software_version": "121.0", "package": { "id": 12, "name": "ff.pkg" } },
                { "software_version": "120.0", "package": null },
                { "software_version": "119.0", "package": { "id": -1, "name": "" } }
            ]
        }))
        .unwrap();
        let ids: Vec<Option<i64>> = title.versions.iter().map(PatchVersion::package_id).collect();
        assert_eq!(ids, vec![Some(12), None, None]);
    }

    #[test]
    fn patch_versions_wrapped_in_version_element() {
        let envelope: PatchTitleEnvelope = serde_json::from_value(json!({
            "patch_software_title": {
                "id": 6,
                "name": "Google Chrome",
                "name_id": "0BC",
                "source_id": 1,
                "notifications": { "web_notification": false, "email_notification": false },
                "versions": {
                    "version": [
                        { "software_version": "120.0.6099.129", "package": { "id": 31, "name": "GoogleChrome-120.pkg" } },
                        { "software_version": "119.0.6045.199", "package": "" }
                    ]
                }
            }
        }))
        .unwrap();
        let title = envelope.patch_software_title;
        assert_eq!(title.name, "Google Chrome");
        let ids: Vec<Option<i64>> = title.versions.iter().map(PatchVersion::package_id).collect();
        assert_eq!(ids, vec![Some(31), None]);
        assert_eq!(title.versions[0].software_version, "120.0.6099.129");
    }

    #[test]
    fn single_patch_version_and_empty_list() {
        let single: PatchSoftwareTitle = serde_json::from_value(json!({
            "name": "Zoom",
            "versions": { "version": { "software_version": "5.17", "package": { "id": 4, "name": "zoom.pkg" } } }
        }))
        .unwrap();
        assert_eq!(single.versions.len(), 1);
        assert_eq!(single.versions[0].package_id(), Some(4));

        for empty in [json!(""), json!(null), json!({ "version": null })] {
            let title: PatchSoftwareTitle =
                serde_json::from_value(json!({ "name": "Slack", "versions": empty })).unwrap();
            assert!(title.versions.is_empty());
        }
    }

    #[test]
    fn unexpected_patch_versions_are_malformed() {
        let err = serde_json::from_value::<PatchSoftwareTitle>(json!({
            "name": "Slack",
            "versions": 7
        }))
        .unwrap_err();
        assert!(err.to_string().contains("versions"));
    }

    #[test]
    fn ldap_uid_accepts_numbers_and_strings() {
        let users: LdapUsers = serde_json::from_value(json!({
            "ldap_users": [ { "uid": 1001 }, { "uid": "abc" } ]
        }))
        .unwrap();
        assert_eq!(users.ldap_users[0].uid_text(), "1001");
        assert_eq!(users.ldap_users[1].uid_text(), "abc");
    }
}
