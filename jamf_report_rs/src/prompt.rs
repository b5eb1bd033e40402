//! Interactive prompts for credentials and output confirmation.
//!
//! Prompts are only shown when a person is at the terminal. Unattended runs
//! (cron, CI, piped output) must supply everything up front.

use anyhow::{Context, Result, bail};
use console::{Term, style};

use crate::api::Credentials;
use crate::config::Settings;

/// Source of answers for the prompts.
pub trait Prompter {
    fn attended(&self) -> bool;
    fn ask(&self, label: &str) -> Result<String>;
    fn ask_secret(&self, label: &str) -> Result<String>;
    fn confirm(&self, question: &str) -> Result<bool>;
}

/// Prompts on the controlling terminal via stderr.
pub struct TermPrompter {
    term: Term,
}

impl TermPrompter {
    pub fn new() -> Self {
        Self {
            term: Term::stderr(),
        }
    }
}

impl Default for TermPrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompter for TermPrompter {
    fn attended(&self) -> bool {
        console::user_attended_stderr() && self.term.is_term()
    }

    fn ask(&self, label: &str) -> Result<String> {
        self.term
            .write_str(&format!("{} ", style(label).bold()))
            .context("failed to write prompt")?;
        let line = self.term.read_line().context("failed to read answer")?;
        Ok(line.trim().to_string())
    }

    fn ask_secret(&self, label: &str) -> Result<String> {
        self.term
            .write_str(&format!("{} ", style(label).bold()))
            .context("failed to write prompt")?;
        self.term
            .read_secure_line()
            .context("failed to read password")
    }

    fn confirm(&self, question: &str) -> Result<bool> {
        let answer = self.ask(&format!("{question} [Y/n]"))?;
        Ok(matches!(answer.to_ascii_lowercase().as_str(), "" | "y" | "yes"))
    }
}

/// Fill a missing URL, username or password, then return the credentials.
///
/// Fails when something is missing and nobody is there to ask.
pub fn complete_credentials<P: Prompter>(settings: &mut Settings, prompter: &P) -> Result<Credentials> {
    let attended = prompter.attended();

    if settings.url.is_none() {
        if !attended {
            bail!("Jamf Pro URL not provided (use --url or JAMF_URL)");
        }
        let url = prompter.ask("Jamf Pro URL:")?;
        if url.is_empty() {
            bail!("Jamf Pro URL is required");
        }
        settings.url = Some(crate::config::normalize_url(&url));
    }

    let username = match settings.username.clone() {
        Some(name) => name,
        None if attended => prompter.ask("Username:")?,
        None => bail!("username not provided (use --username or JAMF_USERNAME)"),
    };
    let password = match settings.password.clone() {
        Some(secret) => secret,
        None if attended => prompter.ask_secret("Password:")?,
        None => bail!("password not provided (use --password or JAMF_PASSWORD)"),
    };
    if username.is_empty() || password.is_empty() {
        bail!("username and password are required");
    }

    settings.username = Some(username.clone());
    settings.password = Some(password.clone());
    Ok(Credentials { username, password })
}

/// Ask before writing unless `--yes` was given or the run is unattended.
pub fn confirm_output<P: Prompter>(settings: &Settings, prompter: &P) -> Result<bool> {
    if settings.assume_yes || !prompter.attended() {
        return Ok(true);
    }
    let sheets: Vec<String> = settings
        .enabled_sheets()
        .iter()
        .map(|sheet| format!("{sheet:?}"))
        .collect();
    prompter.confirm(&format!(
        "Write {} ({}) to {}?",
        settings.format.extension(),
        sheets.join(", "),
        settings.output
    ))
}
