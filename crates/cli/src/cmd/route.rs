use std::path::Path;

use anyhow::{Context, Result};

use arbor_lib::descriptor::PathDescriptor;

pub fn cmd_route(path: &Path, base: &Path) -> Result<()> {
  let dir = PathDescriptor::new(path).with_context(|| format!("Invalid path: {}", path.display()))?;
  let route = dir
    .route_relative_to(base)
    .with_context(|| format!("Cannot route {} relative to {}", path.display(), base.display()))?;
  println!("{}", route);
  Ok(())
}
