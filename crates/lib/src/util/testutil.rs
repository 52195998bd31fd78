//! Test utilities for arbor-lib.
//!
//! Definition trees on disk and a couple of trivial initializers shared by the
//! discovery and builder tests.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::descriptor::PathDescriptor;
use crate::discover::Discoverable;
use crate::factory::{ArtifactFactory, BoxError, Initialize};
use crate::scope::{Configuration, Scope};

/// Write `files` (relative path, contents) under `root`, creating parents.
pub fn write_files(root: &Path, files: &[(&str, &str)]) {
  for (rel, contents) in files {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
  }
}

/// Create empty directories under `root`.
pub fn make_dirs(root: &Path, dirs: &[&str]) {
  for dir in dirs {
    fs::create_dir_all(root.join(dir)).unwrap();
  }
}

/// Resolves to `"<id>@<scope>"`.
pub struct Echo;

#[async_trait]
impl Initialize for Echo {
  type Artifact = String;

  async fn initialize(
    &self,
    scope: &Scope,
    id: &str,
    _directory: &PathDescriptor,
    _config: Configuration,
  ) -> Result<String, BoxError> {
    Ok(format!("{}@{}", id, scope))
  }
}

/// Always fails with the given message.
pub struct Failing(pub &'static str);

#[async_trait]
impl Initialize for Failing {
  type Artifact = ();

  async fn initialize(
    &self,
    _scope: &Scope,
    _id: &str,
    _directory: &PathDescriptor,
    _config: Configuration,
  ) -> Result<(), BoxError> {
    Err(self.0.into())
  }
}

/// Wrap an initializer in a type-erased factory.
pub fn discoverable<I: Initialize>(id: &str, initializer: I) -> Arc<dyn Discoverable> {
  Arc::new(ArtifactFactory::new(id, initializer).unwrap())
}
