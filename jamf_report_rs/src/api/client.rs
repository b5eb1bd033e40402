//! Typed endpoints over a [`Transport`].

use serde::de::DeserializeOwned;

use super::Transport;
use super::models::*;
use crate::error::ApiError;

pub const PRESTAGE_PAGE_SIZE: usize = 100;

pub struct JamfClient<T> {
    transport: T,
}

impl<T: Transport> JamfClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn fetch<D: DeserializeOwned>(&self, path: &str) -> Result<D, ApiError> {
        let value = self.transport.get_json(path).await?;
        serde_json::from_value(value).map_err(|e| ApiError::Malformed {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    // -- packages & scripts ------------------------------------------------

    pub async fn packages(&self) -> Result<Vec<NamedRef>, ApiError> {
        let list: PackageList = self.fetch("/JSSResource/packages").await?;
        Ok(list.packages)
    }

    pub async fn package(&self, id: i64) -> Result<ArtifactDetail, ApiError> {
        let envelope: PackageEnvelope = self
            .fetch(&format!("/JSSResource/packages/id/{id}"))
            .await?;
        Ok(envelope.package)
    }

    pub async fn scripts(&self) -> Result<Vec<NamedRef>, ApiError> {
        let list: ScriptList = self.fetch("/JSSResource/scripts").await?;
        Ok(list.scripts)
    }

    pub async fn script(&self, id: i64) -> Result<ArtifactDetail, ApiError> {
        let envelope: ScriptEnvelope = self
            .fetch(&format!("/JSSResource/scripts/id/{id}"))
            .await?;
        Ok(envelope.script)
    }

    // -- policies ------------------------------------------------------------

    pub async fn policies(&self) -> Result<Vec<NamedRef>, ApiError> {
        let list: PolicyList = self.fetch("/JSSResource/policies").await?;
        Ok(list.policies)
    }

    pub async fn policy(&self, id: i64) -> Result<Policy, ApiError> {
        let envelope: PolicyEnvelope = self
            .fetch(&format!("/JSSResource/policies/id/{id}"))
            .await?;
        Ok(envelope.policy)
    }

    /// Every computer pre-stage enrollment, walking pages until `totalCount`
    /// records have been read.
    pub async fn computer_prestages(&self) -> Result<Vec<PreStage>, ApiError> {
        let mut prestages = Vec::new();
        let mut page = 0usize;
        loop {
            let path = format!(
                "/api/v2/computer-prestages?page={page}&page-size={PRESTAGE_PAGE_SIZE}"
            );
            let batch: PreStagePage = self.fetch(&path).await?;
            let received = batch.results.len();
            prestages.extend(batch.results);
            if received == 0 || prestages.len() as u64 >= batch.total_count {
                break;
            }
            page += 1;
        }
        Ok(prestages)
    }

    // -- patch management ----------------------------------------------------

    pub async fn patch_policies(&self) -> Result<Vec<PatchPolicyRef>, ApiError> {
        let list: PatchPolicyList = self.fetch("/JSSResource/patchpolicies").await?;
        Ok(list.patch_policies)
    }

    pub async fn patch_policy(&self, id: i64) -> Result<PatchPolicy, ApiError> {
        let envelope: PatchPolicyEnvelope = self
            .fetch(&format!("/JSSResource/patchpolicies/id/{id}"))
            .await?;
        Ok(envelope.patch_policy)
    }

    pub async fn patch_software_title(&self, id: i64) -> Result<PatchSoftwareTitle, ApiError> {
        let envelope: PatchTitleEnvelope = self
            .fetch(&format!("/JSSResource/patchsoftwaretitles/id/{id}"))
            .await?;
        Ok(envelope.patch_software_title)
    }

    // -- computers & groups ----------------------------------------------------

    pub async fn computers(&self) -> Result<Vec<NamedRef>, ApiError> {
        let list: ComputerList = self.fetch("/JSSResource/computers").await?;
        Ok(list.computers)
    }

    pub async fn computer(&self, id: i64) -> Result<Computer, ApiError> {
        let envelope: ComputerEnvelope = self
            .fetch(&format!("/JSSResource/computers/id/{id}"))
            .await?;
        Ok(envelope.computer)
    }

    pub async fn computer_group(&self, id: i64) -> Result<ComputerGroup, ApiError> {
        let envelope: ComputerGroupEnvelope = self
            .fetch(&format!("/JSSResource/computergroups/id/{id}"))
            .await?;
        Ok(envelope.computer_group)
    }

    pub async fn computer_group_by_name(&self, name: &str) -> Result<ComputerGroup, ApiError> {
        let path = format!(
            "/JSSResource/computergroups/name/{}",
            urlencoding::encode(name)
        );
        let envelope: ComputerGroupEnvelope = self.fetch(&path).await?;
        Ok(envelope.computer_group)
    }

    // -- configuration profiles -------------------------------------------------

    pub async fn configuration_profiles(&self) -> Result<Vec<NamedRef>, ApiError> {
        let list: ProfileList = self.fetch("/JSSResource/osxconfigurationprofiles").await?;
        Ok(list.os_x_configuration_profiles)
    }

    pub async fn configuration_profile(&self, id: i64) -> Result<ConfigurationProfile, ApiError> {
        let envelope: ProfileEnvelope = self
            .fetch(&format!("/JSSResource/osxconfigurationprofiles/id/{id}"))
            .await?;
        Ok(envelope.os_x_configuration_profile)
    }

    // -- LDAP ----------------------------------------------------------------------

    /// Users matching `user` on the named LDAP server. Empty when unknown.
    pub async fn ldap_user(&self, server: &str, user: &str) -> Result<Vec<LdapUser>, ApiError> {
        let path = format!(
            "/JSSResource/ldapservers/name/{}/user/{}",
            urlencoding::encode(server),
            urlencoding::encode(user)
        );
        let users: LdapUsers = self.fetch(&path).await?;
        Ok(users.ldap_users)
    }
}
