use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::core::types::{VerificationResult, VerificationStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Full results as a pretty JSON array.
    Json,
    /// One full result per line.
    Jsonl,
    /// One caller-facing verdict record per line.
    Records,
    Csv,
    Markdown,
}

pub fn render(results: &[VerificationResult], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(results)? + "\n"),
        OutputFormat::Jsonl => {
            let mut out = String::new();
            for result in results {
                out.push_str(&serde_json::to_string(result)?);
                out.push('\n');
            }
            Ok(out)
        }
        OutputFormat::Records => {
            let mut out = String::new();
            for result in results {
                out.push_str(&serde_json::to_string(&result.to_record())?);
                out.push('\n');
            }
            Ok(out)
        }
        OutputFormat::Csv => Ok(render_csv(results)),
        OutputFormat::Markdown => Ok(render_markdown(results)),
    }
}

pub fn write_results(
    results: &[VerificationResult],
    format: OutputFormat,
    path: &Path,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, render(results, format)?)?;
    Ok(())
}

fn render_csv(results: &[VerificationResult]) -> String {
    let mut out = String::new();
    out.push_str(
        "capture_id,status,brand,suspect_domain,legit_domain,is_phishing,matched,rationale,in_allowlist,confidence\n",
    );
    for r in results {
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{:.2}\n",
            r.capture_id,
            status_label(r.status),
            csv_field(&r.brand),
            r.suspect_domain,
            r.legit_domain,
            r.is_phishing(),
            r.verdict.matched,
            csv_field(&r.verdict.rationale),
            r.suspect_in_allowlist,
            r.confidence
        ));
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn render_markdown(results: &[VerificationResult]) -> String {
    let mut out = String::new();
    out.push_str("# Falcon Verify Report\n\n");
    let phishing = results.iter().filter(|r| r.is_phishing()).count();
    out.push_str(&format!("- Captures: {}\n", results.len()));
    out.push_str(&format!("- Flagged as phishing: {}\n\n", phishing));
    if results.is_empty() {
        out.push_str("No captures.\n");
    }
    for r in results {
        out.push_str(&format!(
            "## {} ({})\n",
            display_or(&r.suspect_domain, "no domain"),
            r.capture_id
        ));
        out.push_str(&format!("- Status: {}\n", status_label(r.status)));
        out.push_str(&format!("- Brand: {}\n", display_or(&r.brand, "unknown")));
        out.push_str(&format!(
            "- Reference domain: {}\n",
            display_or(&r.legit_domain, "none")
        ));
        out.push_str(&format!("- Phishing: {}\n", r.is_phishing()));
        out.push_str(&format!("- Rationale: {}\n", r.verdict.rationale));
        if r.confidence < 0.0 {
            out.push_str("- Confidence: undetermined\n");
        } else {
            out.push_str(&format!("- Confidence: {:.2}\n", r.confidence));
        }
        out.push_str(&format!("- Certificate: {}\n", r.certificate.comment()));
        out.push('\n');
        for line in r.explanation.lines() {
            out.push_str(&format!("> {}\n", line));
        }
        out.push('\n');
    }
    out
}

fn status_label(status: VerificationStatus) -> &'static str {
    match status {
        VerificationStatus::Completed => "completed",
        VerificationStatus::InsufficientInput => "insufficient_input",
        VerificationStatus::NoReferenceDomain => "no_reference_domain",
        VerificationStatus::BrandUnidentified => "brand_unidentified",
    }
}

fn display_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}
