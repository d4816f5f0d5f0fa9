use std::path::Path;

use anyhow::{Context, Result};
use domain::expression::matcher::CompiledExpression;
use domain::fact::entity::Event;
use infrastructure::config::AlertForgeConfig;

use crate::cli::OutputFormat;

// ── Version ─────────────────────────────────────────────────────────────

pub fn cmd_version() {
    println!("alertforge-agent {}", env!("CARGO_PKG_VERSION"));
}

// ── Validate ────────────────────────────────────────────────────────────

/// Load and validate the config file. Any problem, including a malformed
/// event expression, is returned as an error naming the offending field.
pub fn cmd_validate(config_path: &str, output: OutputFormat) -> Result<()> {
    let config = AlertForgeConfig::load(Path::new(config_path))
        .with_context(|| format!("invalid configuration in {config_path}"))?;

    if output == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&config.sanitized())?);
        return Ok(());
    }

    print!("{}", summarize(&config));
    Ok(())
}

fn summarize(config: &AlertForgeConfig) -> String {
    let conditions: usize = config.triggers.iter().map(|t| t.conditions.len()).sum();
    let enabled = config.triggers.iter().filter(|t| t.enabled).count();

    let mut out = String::from("Configuration OK\n");
    out.push_str(&format!("  Plugins:     {}\n", config.plugins.len()));
    out.push_str(&format!("  Actions:     {}\n", config.actions.len()));
    out.push_str(&format!(
        "  Triggers:    {} ({enabled} enabled)\n",
        config.triggers.len()
    ));
    out.push_str(&format!("  Conditions:  {conditions}\n"));
    for trigger in &config.triggers {
        out.push_str(&format!(
            "    {:<12} {:<24} {:>2} condition(s)\n",
            trigger.tenant_id,
            trigger.id,
            trigger.conditions.len()
        ));
    }
    out
}

// ── Match ───────────────────────────────────────────────────────────────

/// Outcome of evaluating one expression against one event.
#[derive(Debug, serde::Serialize)]
pub struct MatchReport {
    pub expression: String,
    pub valid: bool,
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn evaluate_match(expression: &str, event_json: &str) -> Result<MatchReport> {
    let event: Event = serde_json::from_str(event_json).context("invalid event JSON")?;
    let compiled = CompiledExpression::compile(expression);
    Ok(MatchReport {
        expression: expression.to_string(),
        valid: compiled.is_valid(),
        matched: compiled.matches(&event),
        error: compiled.error().map(ToString::to_string),
    })
}

pub fn cmd_match(expression: &str, event_json: &str, output: OutputFormat) -> Result<()> {
    let report = evaluate_match(expression, event_json)?;

    if output == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", report.matched);
    if let Some(error) = &report.error {
        println!("invalid expression: {error}");
    }
    Ok(())
}
