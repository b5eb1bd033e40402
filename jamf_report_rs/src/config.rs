//! Configuration for a report run.
//!
//! Settings come from an optional TOML file (`jamfrep.toml` in the working
//! directory, or `--config PATH`) and are then overridden by CLI flags and
//! environment variables. Passwords are never read from the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Local};
use serde::Deserialize;

use crate::api::{HttpSettings, RetryPolicy};

pub const DEFAULT_CONFIG_FILE: &str = "jamfrep.toml";
pub const DEFAULT_CONCURRENCY: usize = 8;
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_REFRESH_MARGIN_SECS: u64 = 60;

/// Shared folder used for reports on managed Macs.
const SHARED_REPORT_DIR: &str = "/Users/Shared";

fn default_true() -> bool {
    true
}

/// Output document format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Xlsx,
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Xlsx => "xlsx",
            OutputFormat::Json => "json",
        }
    }
}

/// Report sheets that can be switched on and off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Sheet {
    Computers,
    Policies,
    #[value(name = "profiles")]
    #[serde(rename = "profiles")]
    ConfigurationProfiles,
    Packages,
    Scripts,
}

impl Sheet {
    pub const ALL: [Sheet; 5] = [
        Sheet::Computers,
        Sheet::Policies,
        Sheet::ConfigurationProfiles,
        Sheet::Packages,
        Sheet::Scripts,
    ];
}

/// `[computers]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ComputersSection {
    pub enabled: bool,
    /// Report a single computer.
    pub computer_id: Option<i64>,
    /// Report the members of one smart group.
    pub smart_group_id: Option<i64>,
    pub hardware: bool,
    pub filevault: bool,
    pub local_accounts: bool,
    /// Verify local accounts against this LDAP server.
    pub ldap_server: Option<String>,
    pub group_membership: bool,
    pub profile_membership: bool,
    /// Local accounts never reported (system and management accounts).
    pub ignored_accounts: Vec<String>,
}

impl Default for ComputersSection {
    fn default() -> Self {
        Self {
            enabled: true,
            computer_id: None,
            smart_group_id: None,
            hardware: true,
            filevault: true,
            local_accounts: true,
            ldap_server: None,
            group_membership: true,
            profile_membership: true,
            ignored_accounts: ["daemon", "jamfmgmt", "nobody", "root"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// `[policies]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoliciesSection {
    pub enabled: bool,
    pub self_service: bool,
    pub targets: bool,
    pub exclusions: bool,
    pub packages: bool,
    pub scripts: bool,
}

impl Default for PoliciesSection {
    fn default() -> Self {
        Self {
            enabled: true,
            self_service: true,
            targets: true,
            exclusions: true,
            packages: true,
            scripts: true,
        }
    }
}

/// `[configuration_profiles]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProfilesSection {
    pub enabled: bool,
    pub targets: bool,
    pub exclusions: bool,
}

impl Default for ProfilesSection {
    fn default() -> Self {
        Self {
            enabled: true,
            targets: true,
            exclusions: true,
        }
    }
}

/// `[packages]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PackagesSection {
    pub enabled: bool,
    /// Include computer pre-stage enrollments as usage sites.
    pub prestage: bool,
    /// Include patch policies as usage sites.
    pub patch_management: bool,
}

impl Default for PackagesSection {
    fn default() -> Self {
        Self {
            enabled: true,
            prestage: true,
            patch_management: true,
        }
    }
}

/// `[scripts]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScriptsSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ScriptsSection {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Root of `jamfrep.toml`.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub url: Option<String>,
    pub username: Option<String>,
    pub concurrency: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub max_attempts: Option<u32>,
    pub refresh_margin_secs: Option<u64>,
    pub output: Option<String>,
    pub format: Option<OutputFormat>,
    pub computers: ComputersSection,
    pub policies: PoliciesSection,
    pub configuration_profiles: ProfilesSection,
    pub packages: PackagesSection,
    pub scripts: ScriptsSection,
}

impl ReportConfig {
    /// Load from `path`. A missing file yields defaults; a file that exists
    /// but does not parse is an error.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse toml config {}", path.display()))
    }

    /// Load the explicit `--config` file (which must exist) or the default
    /// `jamfrep.toml` in the working directory (which may not).
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) if !path.exists() => {
                Err(anyhow!("config file not found: {}", path.display()))
            }
            Some(path) => Self::load_from_path(path),
            None => Self::load_from_path(Path::new(DEFAULT_CONFIG_FILE)),
        }
    }
}

/// CLI options that can override config file settings.
///
/// Keeps [`resolve_settings`] independent of the clap types.
pub trait CliOptions {
    fn url(&self) -> Option<String>;
    fn username(&self) -> Option<String>;
    fn password(&self) -> Option<String>;
    fn output(&self) -> Option<String>;
    fn format(&self) -> Option<OutputFormat>;
    fn sheets(&self) -> Option<Vec<Sheet>>;
    fn computer_id(&self) -> Option<i64>;
    fn smart_group_id(&self) -> Option<i64>;
    fn ldap_server(&self) -> Option<String>;
    fn prestage(&self) -> Option<bool>;
    fn patch_management(&self) -> Option<bool>;
    fn concurrency(&self) -> Option<usize>;
    fn timeout_secs(&self) -> Option<u64>;
    fn assume_yes(&self) -> bool;
}

/// Where the report goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    File(PathBuf),
    Stdout,
}

impl std::fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputTarget::File(path) => write!(f, "{}", path.display()),
            OutputTarget::Stdout => f.write_str("<stdout>"),
        }
    }
}

/// Fully resolved settings for one run. Credentials may still be missing
/// until the prompt layer fills them.
#[derive(Clone)]
pub struct Settings {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub output: OutputTarget,
    pub format: OutputFormat,
    pub concurrency: usize,
    pub timeout: Duration,
    pub max_attempts: u32,
    pub refresh_margin: Duration,
    pub computers: ComputersSection,
    pub policies: PoliciesSection,
    pub profiles: ProfilesSection,
    pub packages: PackagesSection,
    pub scripts: ScriptsSection,
    pub assume_yes: bool,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("output", &self.output)
            .field("format", &self.format)
            .field("concurrency", &self.concurrency)
            .field("sheets", &self.enabled_sheets())
            .finish_non_exhaustive()
    }
}

impl Settings {
    pub fn enabled_sheets(&self) -> Vec<Sheet> {
        Sheet::ALL
            .into_iter()
            .filter(|sheet| self.is_enabled(*sheet))
            .collect()
    }

    pub fn is_enabled(&self, sheet: Sheet) -> bool {
        match sheet {
            Sheet::Computers => self.computers.enabled,
            Sheet::Policies => self.policies.enabled,
            Sheet::ConfigurationProfiles => self.profiles.enabled,
            Sheet::Packages => self.packages.enabled,
            Sheet::Scripts => self.scripts.enabled,
        }
    }

    fn set_enabled(&mut self, sheet: Sheet, enabled: bool) {
        match sheet {
            Sheet::Computers => self.computers.enabled = enabled,
            Sheet::Policies => self.policies.enabled = enabled,
            Sheet::ConfigurationProfiles => self.profiles.enabled = enabled,
            Sheet::Packages => self.packages.enabled = enabled,
            Sheet::Scripts => self.scripts.enabled = enabled,
        }
    }

    /// Transport settings. Requires the URL to be known.
    pub fn http_settings(&self) -> Result<HttpSettings> {
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| anyhow!("Jamf Pro URL not provided (use --url or JAMF_URL)"))?;
        let mut http = HttpSettings::new(url);
        http.timeout = self.timeout;
        http.concurrency = self.concurrency;
        http.retry = RetryPolicy::default().with_max_attempts(self.max_attempts);
        http.refresh_margin = self.refresh_margin;
        Ok(http)
    }
}

/// Resolve runtime settings from CLI options and config file.
///
/// CLI options take precedence over config file settings.
pub fn resolve_settings<C: CliOptions>(
    cli: &C,
    config: &ReportConfig,
    now: DateTime<Local>,
) -> Result<Settings> {
    let format = cli.format().or(config.format).unwrap_or_default();

    let output = match cli.output().or_else(|| config.output.clone()) {
        Some(raw) if raw == "-" => OutputTarget::Stdout,
        Some(raw) => OutputTarget::File(expand_path(&raw)),
        None => OutputTarget::File(default_output_path(now, format)),
    };

    let mut settings = Settings {
        url: cli.url().or_else(|| config.url.clone()).map(|u| normalize_url(&u)),
        username: cli.username().or_else(|| config.username.clone()),
        password: cli.password(),
        output,
        format,
        concurrency: cli
            .concurrency()
            .or(config.concurrency)
            .unwrap_or(DEFAULT_CONCURRENCY)
            .max(1),
        timeout: Duration::from_secs(
            cli.timeout_secs()
                .or(config.timeout_secs)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        ),
        max_attempts: config.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS).max(1),
        refresh_margin: Duration::from_secs(
            config
                .refresh_margin_secs
                .unwrap_or(DEFAULT_REFRESH_MARGIN_SECS),
        ),
        computers: config.computers.clone(),
        policies: config.policies.clone(),
        profiles: config.configuration_profiles.clone(),
        packages: config.packages.clone(),
        scripts: config.scripts.clone(),
        assume_yes: cli.assume_yes(),
    };

    if let Some(sheets) = cli.sheets() {
        for sheet in Sheet::ALL {
            settings.set_enabled(sheet, sheets.contains(&sheet));
        }
    }
    if let Some(id) = cli.computer_id() {
        settings.computers.computer_id = Some(id);
        settings.computers.smart_group_id = None;
    }
    if let Some(id) = cli.smart_group_id() {
        settings.computers.smart_group_id = Some(id);
        settings.computers.computer_id = None;
    }
    if let Some(server) = cli.ldap_server() {
        settings.computers.ldap_server = Some(server);
    }
    if let Some(prestage) = cli.prestage() {
        settings.packages.prestage = prestage;
    }
    if let Some(patch) = cli.patch_management() {
        settings.packages.patch_management = patch;
    }

    if settings.computers.computer_id.is_some() && settings.computers.smart_group_id.is_some() {
        bail!("[computers] computer_id and smart_group_id are mutually exclusive");
    }
    Ok(settings)
}

/// Expand a leading `~/` to `$HOME`.
pub fn expand_path(raw: &str) -> PathBuf {
    if let Some(stripped) = raw.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(raw)
}

/// `example.jamfcloud.com/` -> `https://example.jamfcloud.com`
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

/// `JAMF_Excel_Report_<Mon_Jan-02-2026_15-04-05>.<ext>` in `/Users/Shared`
/// when it exists, else in the working directory.
pub fn default_output_path(now: DateTime<Local>, format: OutputFormat) -> PathBuf {
    let dir = Path::new(SHARED_REPORT_DIR);
    let dir = if dir.is_dir() { dir } else { Path::new(".") };
    dir.join(format!(
        "JAMF_Excel_Report_{}.{}",
        now.format("%a_%b-%d-%Y_%H-%M-%S"),
        format.extension()
    ))
}

/// Check the output target before any network call.
pub fn validate_output(target: &OutputTarget, format: OutputFormat) -> Result<()> {
    let path = match target {
        OutputTarget::Stdout if format == OutputFormat::Json => return Ok(()),
        OutputTarget::Stdout => bail!("xlsx output cannot be written to stdout; pass a .xlsx path"),
        OutputTarget::File(path) => path,
    };

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    if extension.as_deref() != Some(format.extension()) {
        bail!(
            "output {} must end in .{} for {} output",
            path.display(),
            format.extension(),
            format.extension()
        );
    }

    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.is_dir() => {
            bail!("output directory {} does not exist", dir.display())
        }
        _ => Ok(()),
    }
}
