use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::info;

use crate::cli::config::{load_allowlist, resolve_config};
use crate::cli::flags::{Cli, Command};
use crate::config::AppConfig;
use crate::core::engine::Engine;
use crate::core::types::VerificationResult;
use crate::pipeline::ingress::{stage, CaptureRequest, StagedCapture};
use crate::pipeline::reporter::{render, write_results, OutputFormat};

pub async fn run(cli: Cli) -> Result<()> {
    let cfg = resolve_config(&cli)?;
    let allowlist = load_allowlist(&cfg.allowlist_path)?;
    let engine = Arc::new(Engine::new(cfg.app.clone(), allowlist)?);

    let results = match &cli.command {
        Command::Verify { brand, url, html } => {
            let html = match html {
                Some(path) => fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?,
                None => String::new(),
            };
            vec![engine.verify(brand, url, &html).await]
        }
        Command::Analyze { capture } => {
            let raw = fs::read_to_string(capture)
                .with_context(|| format!("reading {}", capture.display()))?;
            let request: CaptureRequest = serde_json::from_str(&raw)
                .with_context(|| format!("parsing capture {}", capture.display()))?;
            vec![engine.analyze(&stage(request, &cfg.app)).await]
        }
        Command::Batch { input, .. } => {
            let captures = read_batch(input, &cfg.app)?;
            info!("Loaded {} captures from {}", captures.len(), input.display());
            engine.verify_batch(captures).await
        }
    };

    emit(&results, cfg.format, cfg.output.as_deref())
}

/// One capture payload per line; blank lines are skipped.
pub fn read_batch(path: &Path, config: &AppConfig) -> Result<Vec<StagedCapture>> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut captures = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let request: CaptureRequest = serde_json::from_str(line)
            .map_err(|e| anyhow!("{}:{}: {}", path.display(), idx + 1, e))?;
        captures.push(stage(request, config));
    }
    Ok(captures)
}

fn emit(results: &[VerificationResult], format: OutputFormat, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            write_results(results, format, path)?;
            info!("Wrote {} results to {}", results.len(), path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(render(results, format)?.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}
