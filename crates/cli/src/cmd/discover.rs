//! Discover command implementation.
//!
//! Walks a definition tree and lists every artifact it would build.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use arbor_lib::builder::graph::DependencyGraph;
use arbor_lib::builder::{BuildOptions, Builder};
use arbor_lib::kinds::KindRegistry;
use arbor_lib::resource::Catalog;

use crate::output::{print_entry, print_info, print_json, print_success, print_warning};

#[derive(Debug, Serialize)]
struct DiscoveredEntry {
  id: String,
  route: String,
  directory: String,
  file: String,
  depends_on: Vec<String>,
}

pub fn cmd_discover(root: &Path, json: bool) -> Result<()> {
  let builder = Builder::lua(BuildOptions::from_env(root), KindRegistry::with_resources(Catalog::default()))
    .with_context(|| format!("Invalid definition root: {}", root.display()))?;

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let mut found = rt
    .block_on(builder.discover())
    .with_context(|| format!("Failed to discover definitions in {}", root.display()))?;
  found.sort_by(|a, b| a.id().cmp(b.id()));

  let base = builder.root().absolute_path();
  let entries = found
    .iter()
    .map(|d| -> Result<DiscoveredEntry> {
      Ok(DiscoveredEntry {
        id: d.id().to_string(),
        route: d.directory.route_relative_to(base)?,
        directory: dunce::simplified(d.directory.absolute_path()).display().to_string(),
        file: dunce::simplified(&d.file).display().to_string(),
        depends_on: d.factory.dependencies(),
      })
    })
    .collect::<Result<Vec<_>>>()?;

  if json {
    return print_json(&entries);
  }

  if entries.is_empty() {
    print_info(&format!("No artifact definitions found in {}", root.display()));
    return Ok(());
  }

  print_success(&format!("Discovered {} artifact(s) in {}", entries.len(), root.display()));
  for entry in &entries {
    if entry.depends_on.is_empty() {
      print_entry(&entry.id, &entry.route);
    } else {
      print_entry(
        &entry.id,
        &format!("{} (depends on: {})", entry.route, entry.depends_on.join(", ")),
      );
    }
  }

  for (id, dependency) in DependencyGraph::from_discovered(&found).missing() {
    print_warning(&format!("'{}' depends on '{}', which was not discovered", id, dependency));
  }

  Ok(())
}
