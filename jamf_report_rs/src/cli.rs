//! Command-line surface of `jamfrep`.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{CliOptions, OutputFormat, Sheet};

#[derive(Parser, Debug, Clone)]
#[command(name = "jamfrep")]
#[command(version, about = "Jamf Pro inventory and package/script usage report")]
#[command(after_help = "Settings not given on the command line are read from \
    ./jamfrep.toml (or --config). Passwords are only read from --password, \
    JAMF_PASSWORD or the interactive prompt.")]
pub struct Cli {
    /// Jamf Pro server, e.g. https://example.jamfcloud.com
    #[arg(long, env = "JAMF_URL")]
    pub url: Option<String>,

    /// API account name
    #[arg(long, env = "JAMF_USERNAME")]
    pub username: Option<String>,

    /// API account password
    #[arg(long, env = "JAMF_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// TOML config file (default: ./jamfrep.toml when present)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output file; `-` writes JSON to stdout
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<String>,

    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Comma-separated sheets to write; replaces the configured set
    #[arg(long, value_enum, value_delimiter = ',', num_args = 0..)]
    pub sheets: Option<Vec<Sheet>>,

    /// Report a single computer
    #[arg(long, conflicts_with = "smart_group_id")]
    pub computer_id: Option<i64>,

    /// Report the members of one smart computer group
    #[arg(long)]
    pub smart_group_id: Option<i64>,

    /// Check local accounts against this LDAP server
    #[arg(long, value_name = "NAME")]
    pub ldap_server: Option<String>,

    /// Count pre-stage enrollments as package usage
    #[arg(long, value_name = "BOOL")]
    pub prestage: Option<bool>,

    /// Count patch policies as package usage
    #[arg(long, value_name = "BOOL")]
    pub patch_management: Option<bool>,

    /// Maximum HTTP requests in flight
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Do not ask for confirmation before writing
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Log level (trace, debug, info, warn, error); RUST_LOG wins when set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl CliOptions for Cli {
    fn url(&self) -> Option<String> {
        self.url.clone()
    }
    fn username(&self) -> Option<String> {
        self.username.clone()
    }
    fn password(&self) -> Option<String> {
        self.password.clone()
    }
    fn output(&self) -> Option<String> {
        self.output.clone()
    }
    fn format(&self) -> Option<OutputFormat> {
        self.format
    }
    fn sheets(&self) -> Option<Vec<Sheet>> {
        self.sheets.clone()
    }
    fn computer_id(&self) -> Option<i64> {
        self.computer_id
    }
    fn smart_group_id(&self) -> Option<i64> {
        self.smart_group_id
    }
    fn ldap_server(&self) -> Option<String> {
        self.ldap_server.clone()
    }
    fn prestage(&self) -> Option<bool> {
        self.prestage
    }
    fn patch_management(&self) -> Option<bool> {
        self.patch_management
    }
    fn concurrency(&self) -> Option<usize> {
        self.concurrency
    }
    fn timeout_secs(&self) -> Option<u64> {
        self.timeout
    }
    fn assume_yes(&self) -> bool {
        self.yes
    }
}
