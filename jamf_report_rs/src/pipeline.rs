//! One report run, start to finish.
//!
//! Order matters: the output target is checked before any network call, all
//! catalogs are complete before a cross-reference pass, and the token is
//! invalidated whatever the outcome.

use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use report_common::ArtifactKind;

use crate::api::models::Policy;
use crate::api::{HttpTransport, JamfClient, Transport};
use crate::collect::{
    computers_table, fetch_metadata, fetch_policy_details, list_artifacts, patch_sites,
    policies_table, profiles_table, usage_catalogs,
};
use crate::config::{OutputFormat, OutputTarget, Settings, validate_output};
use crate::error::{ApiError, recover};
use crate::progress::{self, Spinner, Status};
use crate::prompt::{Prompter, complete_credentials, confirm_output};
use crate::report::{
    COMPUTER_ROW_FILLS, COMPUTERS_SHEET, JsonSink, JsonTarget, NOT_USED_FILL, PACKAGES_SHEET,
    POLICIES_SHEET, PROFILES_SHEET, SCRIPTS_SHEET, Table, XlsxSink, assemble,
};
use crate::usage::{MetadataTable, cross_reference};

/// What a finished run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Sheets written, in workbook order.
    pub sheets: Vec<String>,
    pub rows: usize,
    /// Artifacts left out because their detail record could not be read.
    pub skipped_artifacts: usize,
    pub elapsed: Duration,
}

/// Collected sheets plus bookkeeping for the summary.
#[derive(Debug, Default)]
pub struct Collected {
    pub tables: Vec<Table>,
    pub skipped_artifacts: usize,
}

/// A sheet whose listing failed is left out; only `Auth` aborts the run.
fn sheet_or_skip<T>(result: Result<T, ApiError>, sheet: &str) -> Result<Option<T>, ApiError> {
    recover(result, &format!("sheet '{sheet}'"))
}

struct UsageSheet {
    table: Table,
    metadata: MetadataTable,
    skipped: usize,
}

/// Package or script usage sheet. `None` when one of its catalogs could not
/// be listed or came back short; classifying against a partial index would
/// mark used artifacts as unused.
async fn usage_sheet<T: Transport>(
    client: &JamfClient<T>,
    settings: &Settings,
    kind: ArtifactKind,
    policies: &[Policy],
) -> Result<Option<UsageSheet>, ApiError> {
    let (sheet, id_column) = match kind {
        ArtifactKind::Package => (PACKAGES_SHEET, "Package ID"),
        ArtifactKind::Script => (SCRIPTS_SHEET, "Script ID"),
    };
    let limit = settings.concurrency;

    let Some(artifacts) = sheet_or_skip(list_artifacts(client, kind).await, sheet)? else {
        return Ok(None);
    };

    let mut prestages = None;
    let mut patch = None;
    if kind == ArtifactKind::Package {
        if settings.packages.prestage {
            match sheet_or_skip(client.computer_prestages().await, sheet)? {
                Some(found) => prestages = Some(found),
                None => return Ok(None),
            }
        }
        if settings.packages.patch_management {
            match sheet_or_skip(patch_sites(client, limit).await, sheet)? {
                Some(found) if found.is_complete() => patch = Some(found.records),
                Some(found) => {
                    tracing::warn!(
                        "{} patch record(s) unreadable, leaving out '{sheet}'",
                        found.unreadable
                    );
                    return Ok(None);
                }
                None => return Ok(None),
            }
        }
    }

    let metadata = fetch_metadata(client, kind, artifacts.iter().map(|a| a.id), limit).await?;
    let catalogs = usage_catalogs(kind, policies, prestages.as_deref(), patch);
    tracing::info!(
        "{} {}s against {} usage sites",
        artifacts.len(),
        kind.as_label(),
        catalogs.total_sites()
    );

    let result = cross_reference(kind, &artifacts, &catalogs, &metadata);
    let mut table = Table::new(sheet)
        .with_rows(result.report_rows())
        .highlight(
            "Type",
            format!("{} Not Used", kind.display_name()),
            NOT_USED_FILL,
        );
    table.sort_by_id(id_column);

    Ok(Some(UsageSheet {
        table,
        metadata,
        skipped: result.skipped.len(),
    }))
}

fn finish_phase<T>(spinner: Spinner, outcome: &Option<T>, done: &str, sheet: &str) {
    match outcome {
        Some(_) => spinner.finish(Status::Done, done),
        None => spinner.finish(Status::Partial, &format!("'{sheet}' left out, see log")),
    }
}

/// Walk every enabled sheet. Tables come back in workbook order.
pub async fn collect_tables<T: Transport>(
    client: &JamfClient<T>,
    settings: &Settings,
) -> Result<Collected, ApiError> {
    let limit = settings.concurrency;
    let mut collected = Collected::default();

    let mut computers = None;
    if settings.computers.enabled {
        let spinner = Spinner::new("Collecting computers");
        computers = sheet_or_skip(
            computers_table(client, &settings.computers, limit).await,
            COMPUTERS_SHEET,
        )?;
        finish_phase(spinner, &computers, "Computers collected", COMPUTERS_SHEET);
    }

    let needs_policies =
        settings.policies.enabled || settings.packages.enabled || settings.scripts.enabled;
    let mut policies = None;
    if needs_policies {
        let spinner = Spinner::new("Collecting policies");
        policies = recover(fetch_policy_details(client, limit).await, "policy listing")?;
        match &policies {
            Some(found) if found.is_complete() => spinner.finish(
                Status::Done,
                &format!(
                    "{} collected",
                    progress::format_count(found.records.len(), "policy", "policies")
                ),
            ),
            Some(found) => {
                tracing::warn!(
                    "{} policy detail(s) unreadable, leaving out the package and script sheets",
                    found.unreadable
                );
                spinner.finish(
                    Status::Partial,
                    &format!(
                        "{} unreadable; package and script sheets left out",
                        progress::format_count(found.unreadable, "policy", "policies")
                    ),
                );
            }
            None => spinner.finish(
                Status::Partial,
                "Policies unavailable; policy, package and script sheets left out",
            ),
        }
    }

    let mut packages = None;
    let mut scripts = None;
    let complete_policies = policies.as_ref().filter(|found| found.is_complete());
    if let Some(policies) = complete_policies.map(|found| found.records.as_slice()) {
        if settings.packages.enabled {
            let spinner = Spinner::new("Cross-referencing packages");
            packages = usage_sheet(client, settings, ArtifactKind::Package, policies).await?;
            finish_phase(spinner, &packages, "Packages cross-referenced", PACKAGES_SHEET);
        }
        if settings.scripts.enabled {
            let spinner = Spinner::new("Cross-referencing scripts");
            scripts = usage_sheet(client, settings, ArtifactKind::Script, policies).await?;
            finish_phase(spinner, &scripts, "Scripts cross-referenced", SCRIPTS_SHEET);
        }
    }

    let mut policy_table = None;
    let policy_records = policies.as_ref().map(|found| found.records.as_slice());
    if let (true, Some(policies)) = (settings.policies.enabled, policy_records) {
        let spinner = Spinner::new("Building policy sheet");
        policy_table = sheet_or_skip(
            policies_table(
                client,
                policies,
                &settings.policies,
                packages.as_ref().map(|sheet| &sheet.metadata),
                scripts.as_ref().map(|sheet| &sheet.metadata),
                limit,
            )
            .await,
            POLICIES_SHEET,
        )?;
        finish_phase(spinner, &policy_table, "Policy sheet built", POLICIES_SHEET);
    }

    let mut profiles = None;
    if settings.profiles.enabled {
        let spinner = Spinner::new("Collecting configuration profiles");
        profiles = sheet_or_skip(
            profiles_table(client, &settings.profiles, limit).await,
            PROFILES_SHEET,
        )?;
        finish_phase(
            spinner,
            &profiles,
            "Configuration profiles collected",
            PROFILES_SHEET,
        );
    }

    if let Some(mut table) = computers {
        table.sort_by_id("Computer ID");
        let table = COMPUTER_ROW_FILLS
            .iter()
            .fold(table, |table, (kind, rgb)| table.highlight("Type", *kind, *rgb));
        collected.tables.push(table);
    }
    if let Some(mut table) = policy_table {
        table.sort_by_id("Policy ID");
        collected.tables.push(table.band_by("Policy ID", NOT_USED_FILL));
    }
    if let Some(mut table) = profiles {
        table.sort_by_id("Configuration Profile ID");
        collected
            .tables
            .push(table.band_by("Configuration Profile ID", NOT_USED_FILL));
    }
    for sheet in [packages, scripts].into_iter().flatten() {
        collected.skipped_artifacts += sheet.skipped;
        collected.tables.push(sheet.table);
    }
    Ok(collected)
}

/// Hand the tables to the sink matching the output settings.
pub fn write_tables(tables: &[Table], format: OutputFormat, output: &OutputTarget) -> Result<Vec<String>> {
    match (format, output) {
        (OutputFormat::Xlsx, OutputTarget::File(path)) => assemble(tables, XlsxSink::new(path)),
        (OutputFormat::Json, OutputTarget::File(path)) => {
            assemble(tables, JsonSink::new(JsonTarget::File(path.clone())))
        }
        (OutputFormat::Json, OutputTarget::Stdout) => {
            assemble(tables, JsonSink::new(JsonTarget::Stdout))
        }
        (OutputFormat::Xlsx, OutputTarget::Stdout) => {
            bail!("xlsx output cannot be written to stdout")
        }
    }
}

/// Collect and write a report over any transport.
pub async fn report<T: Transport>(client: &JamfClient<T>, settings: &Settings) -> Result<RunSummary> {
    let started = Instant::now();
    let collected = collect_tables(client, settings).await?;
    let rows = collected.tables.iter().map(Table::len).sum();
    if rows == 0 {
        tracing::warn!("no rows collected; the report will be empty");
    }
    let sheets = write_tables(&collected.tables, settings.format, &settings.output)?;
    Ok(RunSummary {
        sheets,
        rows,
        skipped_artifacts: collected.skipped_artifacts,
        elapsed: started.elapsed(),
    })
}

/// Closing status lines for a finished run.
fn summary_lines(summary: &RunSummary, output: &OutputTarget) -> Vec<(Status, String)> {
    let mut lines = vec![(
        Status::Done,
        format!(
            "Wrote {} ({}) to {} in {}",
            progress::format_count(summary.sheets.len(), "sheet", "sheets"),
            progress::format_count(summary.rows, "row", "rows"),
            output,
            progress::format_duration(summary.elapsed)
        ),
    )];
    if summary.skipped_artifacts > 0 {
        lines.push((
            Status::Partial,
            format!(
                "{} left out (detail lookup failed, see log)",
                progress::format_count(summary.skipped_artifacts, "artifact", "artifacts")
            ),
        ));
    }
    lines
}

/// Full run against a live server: validate, prompt, report, log out.
///
/// Returns `None` when there was nothing to do (no sheets selected, or the
/// operator declined).
pub async fn execute<P: Prompter>(mut settings: Settings, prompter: &P) -> Result<Option<RunSummary>> {
    validate_output(&settings.output, settings.format)?;
    if settings.enabled_sheets().is_empty() {
        tracing::info!("no sheets selected, nothing to do");
        return Ok(None);
    }

    let credentials = complete_credentials(&mut settings, prompter)?;
    if !confirm_output(&settings, prompter)? {
        progress::line(Status::Note, "Cancelled, nothing written");
        return Ok(None);
    }
    tracing::debug!("{settings:?}");

    let transport = HttpTransport::new(settings.http_settings()?, credentials)?;
    let client = JamfClient::new(transport);
    let outcome = report(&client, &settings).await;
    client.transport().session().invalidate().await;

    let summary = outcome?;
    for (status, message) in summary_lines(&summary, &settings.output) {
        progress::line(status, &message);
    }
    Ok(Some(summary))
}
