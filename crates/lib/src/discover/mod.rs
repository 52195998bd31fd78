//! Definition discovery.
//!
//! Discovery walks a directory tree, hands every file a [`DefinitionLoader`]
//! accepts to that loader, and keeps the [`Discoverable`] factories it returns
//! together with the descriptor of the directory they were found in. Sibling
//! directories and files are visited concurrently, so the order of the
//! returned set is unspecified.
//!
//! # Submodules
//!
//! - `manifest` - [`ManifestLoader`], explicit registration of factories by path
//! - `types` - [`LoadError`] and [`DiscoverError`]

mod manifest;
mod types;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::{debug, trace};

use crate::descriptor::PathDescriptor;
use crate::factory::{ArtifactFactory, FactoryError, Initialize};
use crate::scope::{Configuration, Scope};

pub use manifest::{Export, ManifestLoader};
pub use types::{DiscoverError, LoadError};

/// Type-erased view of an [`ArtifactFactory`], as seen by the builder.
#[async_trait]
pub trait Discoverable: Send + Sync + 'static {
  fn id(&self) -> &str;

  /// Declared dependency ids, used for the cycle check.
  fn dependencies(&self) -> Vec<String>;

  /// Initialize the artifact for `scope`, discarding the instance.
  async fn init(&self, scope: &Scope, directory: &PathDescriptor, config: &Configuration) -> Result<(), FactoryError>;
}

#[async_trait]
impl<I: Initialize> Discoverable for ArtifactFactory<I> {
  fn id(&self) -> &str {
    ArtifactFactory::id(self)
  }

  fn dependencies(&self) -> Vec<String> {
    self.initializer().dependencies()
  }

  async fn init(&self, scope: &Scope, directory: &PathDescriptor, config: &Configuration) -> Result<(), FactoryError> {
    ArtifactFactory::init(self, scope, directory, config).await.map(|_| ())
  }
}

/// Turns definition files into factories.
///
/// `load` runs on the blocking pool, so implementations may do synchronous
/// file IO and evaluation.
pub trait DefinitionLoader: Send + Sync + 'static {
  /// Whether a file with this name is a definition candidate.
  fn matches(&self, file_name: &str) -> bool;

  /// Load one candidate file found in `directory`.
  ///
  /// `Ok(None)` means the file loaded fine but does not export a factory; it
  /// is skipped. Errors abort the whole walk.
  fn load(&self, path: &Path, directory: &PathDescriptor) -> Result<Option<Arc<dyn Discoverable>>, LoadError>;
}

/// A factory found during discovery and the directory containing its file.
#[derive(Clone)]
pub struct Discovered {
  pub factory: Arc<dyn Discoverable>,
  pub directory: PathDescriptor,
  pub file: PathBuf,
}

impl Discovered {
  pub fn id(&self) -> &str {
    self.factory.id()
  }
}

impl std::fmt::Debug for dyn Discoverable {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Discoverable")
      .field("id", &self.id())
      .field("dependencies", &self.dependencies())
      .finish()
  }
}

impl std::fmt::Debug for Discovered {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Discovered")
      .field("factory", &self.factory)
      .field("directory", &self.directory)
      .field("file", &self.file)
      .finish()
  }
}

type WalkFuture = Pin<Box<dyn Future<Output = Result<Vec<Discovered>, DiscoverError>> + Send>>;

/// Discover every factory below `root`.
///
/// The first unreadable directory or failing load aborts the walk; work still
/// in flight is cancelled.
pub async fn discover(
  root: &PathDescriptor,
  loader: Arc<dyn DefinitionLoader>,
) -> Result<Vec<Discovered>, DiscoverError> {
  let found = walk(root.clone(), loader).await?;
  debug!(root = %root, count = found.len(), "discovery complete");
  Ok(found)
}

fn walk(directory: PathDescriptor, loader: Arc<dyn DefinitionLoader>) -> WalkFuture {
  Box::pin(async move {
    let dir_path = directory.absolute_path().to_path_buf();
    let read_dir_err = |source| DiscoverError::ReadDir {
      path: dir_path.clone(),
      source,
    };

    let mut entries = tokio::fs::read_dir(&dir_path).await.map_err(read_dir_err)?;
    let mut tasks: JoinSet<Result<Vec<Discovered>, DiscoverError>> = JoinSet::new();

    while let Some(entry) = entries.next_entry().await.map_err(read_dir_err)? {
      let file_type = entry.file_type().await.map_err(read_dir_err)?;
      let file_name = entry.file_name();
      let name = file_name.to_string_lossy();

      if file_type.is_dir() {
        let child = directory.create_child(&file_name)?;
        tasks.spawn(walk(child, Arc::clone(&loader)));
      } else if file_type.is_file() && loader.matches(&name) {
        let loader = Arc::clone(&loader);
        let directory = directory.clone();
        let file = entry.path();
        tasks.spawn_blocking(move || load_one(loader.as_ref(), file, directory));
      } else {
        trace!(dir = %directory, entry = %name, "skipping entry");
      }
    }

    let mut found = Vec::new();
    while let Some(joined) = tasks.join_next().await {
      found.extend(joined??);
    }
    Ok(found)
  })
}

fn load_one(
  loader: &dyn DefinitionLoader,
  file: PathBuf,
  directory: PathDescriptor,
) -> Result<Vec<Discovered>, DiscoverError> {
  match loader.load(&file, &directory) {
    Ok(Some(factory)) => {
      debug!(artifact = %factory.id(), file = %file.display(), "discovered artifact");
      Ok(vec![Discovered {
        factory,
        directory,
        file,
      }])
    }
    Ok(None) => {
      debug!(file = %file.display(), "definition exports no artifact");
      Ok(Vec::new())
    }
    Err(source) => Err(DiscoverError::Load { path: file, source }),
  }
}
