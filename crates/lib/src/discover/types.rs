use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::descriptor::PathError;
use crate::factory::FactoryError;

/// Errors raised while loading a single definition file.
#[derive(Debug, Error)]
pub enum LoadError {
  #[error("lua error in '{path}': {message}")]
  Lua { path: PathBuf, message: String },

  #[error("invalid definition in '{path}': {message}")]
  Definition { path: PathBuf, message: String },

  #[error("'{path}' is not registered in the manifest")]
  Unregistered { path: PathBuf },

  #[error("artifact id '{id}' in '{path}' is already defined by '{first}'")]
  DuplicateId { id: String, path: PathBuf, first: PathBuf },

  #[error(transparent)]
  Factory(#[from] FactoryError),
}

/// Errors that abort a discovery walk.
#[derive(Debug, Error)]
pub enum DiscoverError {
  #[error("failed to read directory '{path}': {source}")]
  ReadDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to load definition '{path}': {source}")]
  Load {
    path: PathBuf,
    #[source]
    source: LoadError,
  },

  #[error(transparent)]
  Path(#[from] PathError),

  #[error("discovery task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
}
