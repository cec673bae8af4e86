use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use tracing::warn;

use crate::cli::flags::{Cli, Command};
use crate::config::{load_config, AppConfig};
use crate::pipeline::allowlist::AllowList;
use crate::pipeline::reporter::OutputFormat;

/// Everything a command needs, resolved from the config file and flags.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub app: AppConfig,
    pub allowlist_path: PathBuf,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
}

pub fn resolve_config(cli: &Cli) -> Result<RunConfig> {
    let mut app = load_config(cli.config.as_deref())?;

    if let Some(ms) = cli.deadline_ms {
        if ms == 0 {
            return Err(anyhow!("--deadline-ms must be positive"));
        }
        app.verify_deadline_ms = ms;
    }
    if let Command::Batch {
        workers: Some(workers),
        ..
    } = &cli.command
    {
        if *workers == 0 {
            return Err(anyhow!("--workers must be at least 1"));
        }
        app.max_concurrent_verifications = *workers;
    }

    let allowlist_path = cli
        .allowlist
        .clone()
        .unwrap_or_else(|| PathBuf::from(&app.allowlist_path));

    let format = match (&cli.format, &cli.command) {
        (Some(fmt), _) => fmt.clone().into(),
        (None, Command::Analyze { .. }) => OutputFormat::Records,
        (None, Command::Batch { .. }) => OutputFormat::Jsonl,
        (None, Command::Verify { .. }) => OutputFormat::Json,
    };

    Ok(RunConfig {
        app,
        allowlist_path,
        format,
        output: cli.output.clone(),
    })
}

/// A missing allow-list is not fatal: every brand then goes to the oracle.
pub fn load_allowlist(path: &Path) -> Result<AllowList> {
    if !path.exists() {
        warn!(
            "allow-list {} not found; reference domains come from the oracle only",
            path.display()
        );
        return Ok(AllowList::default());
    }
    Ok(AllowList::load(path)?)
}
