use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::descriptor::PathDescriptor;

use super::{DefinitionLoader, Discoverable, LoadError};

/// What a registered definition file exports.
#[derive(Clone)]
pub enum Export {
  Factory(Arc<dyn Discoverable>),
  /// Anything that is not a factory. Discovery skips it.
  Value(serde_json::Value),
}

/// A loader backed by an explicit table of files.
///
/// Factories are compiled into the host program and registered under the
/// path of their definition file, relative to the discovery root. Files that
/// match the extension but were never registered fail to load.
pub struct ManifestLoader {
  root: PathBuf,
  extension: String,
  exports: HashMap<PathBuf, Export>,
}

impl ManifestLoader {
  pub fn new(root: &PathDescriptor, extension: impl Into<String>) -> Self {
    Self {
      root: root.absolute_path().to_path_buf(),
      extension: extension.into(),
      exports: HashMap::new(),
    }
  }

  pub fn register(mut self, relative: impl AsRef<Path>, factory: Arc<dyn Discoverable>) -> Self {
    self
      .exports
      .insert(relative.as_ref().to_path_buf(), Export::Factory(factory));
    self
  }

  pub fn register_value(mut self, relative: impl AsRef<Path>, value: serde_json::Value) -> Self {
    self.exports.insert(relative.as_ref().to_path_buf(), Export::Value(value));
    self
  }
}

impl DefinitionLoader for ManifestLoader {
  fn matches(&self, file_name: &str) -> bool {
    Path::new(file_name)
      .extension()
      .is_some_and(|ext| ext == self.extension.as_str())
  }

  fn load(&self, path: &Path, _directory: &PathDescriptor) -> Result<Option<Arc<dyn Discoverable>>, LoadError> {
    let relative = path.strip_prefix(&self.root).unwrap_or(path);
    match self.exports.get(relative) {
      Some(Export::Factory(factory)) => Ok(Some(Arc::clone(factory))),
      Some(Export::Value(_)) => Ok(None),
      None => Err(LoadError::Unregistered {
        path: path.to_path_buf(),
      }),
    }
  }
}
