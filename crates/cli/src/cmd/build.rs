//! Build command implementation.
//!
//! Builds every Lua definition below a root for one scope and reports the
//! resolved resources.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use arbor_lib::builder::{BuildOptions, Builder, BuildSummary};
use arbor_lib::kinds::KindRegistry;
use arbor_lib::resource::{Catalog, Resource};
use arbor_lib::scope::{Configuration, Scope};

use crate::output::{format_duration, print_entry, print_json, print_stat, print_success};

pub struct BuildArgs {
  pub root: PathBuf,
  pub scope: String,
  pub labels: Vec<(String, String)>,
  pub set: Vec<(String, serde_json::Value)>,
  pub timeout: Option<Duration>,
  pub skip_cycle_check: bool,
  pub json: bool,
}

#[derive(Serialize)]
struct BuildReport<'a> {
  #[serde(flatten)]
  summary: &'a BuildSummary,
  resources: Vec<&'a Resource>,
}

fn split_entry(raw: &str) -> Result<(&str, &str), String> {
  let (key, value) = raw
    .split_once('=')
    .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
  let key = key.trim();
  if key.is_empty() {
    return Err(format!("missing key in '{}'", raw));
  }
  Ok((key, value))
}

/// Parse a `KEY=VALUE` scope label.
pub fn parse_label(raw: &str) -> Result<(String, String), String> {
  let (key, value) = split_entry(raw)?;
  Ok((key.to_string(), value.to_string()))
}

/// Parse a `KEY=VALUE` configuration entry.
///
/// The value is read as JSON when it parses (`3`, `true`, `{"a":1}`) and
/// kept as a plain string otherwise.
pub fn parse_key_value(raw: &str) -> Result<(String, serde_json::Value), String> {
  let (key, value) = split_entry(raw)?;
  let value = serde_json::from_str(value).unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
  Ok((key.to_string(), value))
}

pub fn cmd_build(args: BuildArgs) -> Result<()> {
  let mut scope = Scope::new(args.scope).context("Invalid scope")?;
  for (key, value) in args.labels {
    scope = scope.with_label(key, value);
  }

  let mut options = BuildOptions::from_env(&args.root);
  if args.timeout.is_some() {
    options = options.with_timeout(args.timeout);
  }
  if args.skip_cycle_check {
    options = options.with_cycle_check(false);
  }
  let config: Configuration = args.set.into_iter().collect();
  debug!(?options, config_keys = config.len(), "resolved build options");

  let catalog = Catalog::default();
  let builder = Builder::lua(options, KindRegistry::with_resources(catalog.clone()))
    .with_context(|| format!("Invalid definition root: {}", args.root.display()))?;

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let summary = rt
    .block_on(builder.build(&scope, &config))
    .with_context(|| format!("Build failed for scope '{}'", scope))?;

  let mut ids = summary.initialized.clone();
  ids.sort();
  let resolved: Vec<_> = ids
    .iter()
    .filter_map(|id| catalog.get(id)?.resolution(&scope)?.instance().cloned())
    .collect();

  if args.json {
    return print_json(&BuildReport {
      summary: &summary,
      resources: resolved.iter().map(|r| r.as_ref()).collect(),
    });
  }

  print_success(&format!(
    "Built {} artifact(s) for scope '{}' in {}",
    summary.initialized.len(),
    summary.scope,
    format_duration(summary.elapsed)
  ));
  print_stat("Root", &builder.root().to_string());
  for (key, value) in &summary.labels {
    print_stat(key, value);
  }
  if !resolved.is_empty() {
    println!();
  }
  for resource in &resolved {
    let mut detail = resource.route.clone().unwrap_or_else(|| "(no route)".to_string());
    if !resource.depends_on.is_empty() {
      detail.push_str(&format!(" (depends on: {})", resource.depends_on.join(", ")));
    }
    print_entry(&resource.id, &detail);
  }

  Ok(())
}
