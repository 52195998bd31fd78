//! Artifact kinds.
//!
//! A definition file names its kind; the [`KindRegistry`] maps that name to a
//! constructor which turns the definition's data into a factory.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::descriptor::PathDescriptor;
use crate::discover::{Discoverable, LoadError};
use crate::resource::{self, Catalog};

/// Name of the built-in resource kind.
pub const RESOURCE_KIND: &str = "resource";

/// A definition as read from its file, before it becomes a factory.
#[derive(Debug, Clone)]
pub struct Definition {
  pub kind: String,
  pub file: PathBuf,
  pub directory: PathDescriptor,
  pub data: serde_json::Value,
}

type Constructor = Arc<dyn Fn(Definition) -> Result<Arc<dyn Discoverable>, LoadError> + Send + Sync>;

/// Maps kind names to factory constructors.
#[derive(Clone, Default)]
pub struct KindRegistry {
  kinds: HashMap<String, Constructor>,
}

impl KindRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// A registry with the built-in `resource` kind, registering into `catalog`.
  pub fn with_resources(catalog: Catalog) -> Self {
    Self::new().register(RESOURCE_KIND, move |definition| resource::construct(&catalog, definition))
  }

  pub fn register<F>(mut self, kind: impl Into<String>, constructor: F) -> Self
  where
    F: Fn(Definition) -> Result<Arc<dyn Discoverable>, LoadError> + Send + Sync + 'static,
  {
    self.kinds.insert(kind.into(), Arc::new(constructor));
    self
  }

  pub fn contains(&self, kind: &str) -> bool {
    self.kinds.contains_key(kind)
  }

  /// Kind names, sorted.
  pub fn kinds(&self) -> Vec<&str> {
    let mut kinds: Vec<&str> = self.kinds.keys().map(String::as_str).collect();
    kinds.sort_unstable();
    kinds
  }

  /// Build the factory for `definition`, or `None` if its kind is unknown.
  pub fn construct(&self, definition: Definition) -> Option<Result<Arc<dyn Discoverable>, LoadError>> {
    let constructor = self.kinds.get(&definition.kind)?;
    Some(constructor(definition))
  }
}

impl std::fmt::Debug for KindRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("KindRegistry").field("kinds", &self.kinds()).finish()
  }
}
