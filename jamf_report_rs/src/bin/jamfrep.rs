//! `jamfrep` - Jamf Pro report generator.

use std::panic;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use jamf_report::cli::Cli;
use jamf_report::config::{ReportConfig, resolve_settings};
use jamf_report::progress::{self, Status};
use jamf_report::prompt::TermPrompter;

/// Keep a closed stdout (`jamfrep -o - | head`) from ending in a panic trace.
fn install_panic_hook() {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let message = info
            .payload()
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_default();
        if message.contains("Broken pipe") || message.contains("os error 32") {
            return;
        }
        default_hook(info);
    }));
}

fn is_broken_pipe(err: &anyhow::Error) -> bool {
    let text = format!("{err:?}");
    text.contains("Broken pipe") || text.contains("os error 32")
}

async fn run(cli: Cli) -> Result<()> {
    // Initialize logging - stderr only, stdout may carry the JSON report
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.parse().unwrap_or_default()),
        )
        .init();

    let config = ReportConfig::discover(cli.config.as_deref())?;
    let settings = resolve_settings(&cli, &config, chrono::Local::now())?;
    tracing::debug!("sheets enabled: {:?}", settings.enabled_sheets());

    jamf_report::execute(settings, &TermPrompter::new()).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    install_panic_hook();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if is_broken_pipe(&err) => ExitCode::SUCCESS,
        Err(err) => {
            progress::line(Status::Failed, &format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}
