use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::descriptor::PathError;
use crate::discover::DiscoverError;
use crate::factory::FactoryError;

/// Errors that fail a build.
#[derive(Debug, Error)]
pub enum BuildError {
  #[error(transparent)]
  InvalidArgument(#[from] PathError),

  #[error(transparent)]
  Discovery(#[from] DiscoverError),

  #[error("dependency cycle between: {}", .ids.join(", "))]
  CyclicDependency { ids: Vec<String> },

  /// The first initialization failure observed.
  #[error("failed to build artifact '{id}': {source}")]
  Initialization {
    id: String,
    #[source]
    source: FactoryError,
  },

  #[error("discovery of '{}' timed out after {timeout:?}", .root.display())]
  DiscoveryTimedOut { root: PathBuf, timeout: Duration },

  #[error("build for scope [{scope}] timed out after {timeout:?}; still pending: {}", .pending.join(", "))]
  TimedOut {
    scope: String,
    timeout: Duration,
    pending: Vec<String>,
  },

  #[error("build task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
}

impl BuildError {
  /// The id of the artifact that failed, when the error is about one.
  pub fn artifact_id(&self) -> Option<&str> {
    match self {
      BuildError::Initialization { id, .. } => Some(id),
      _ => None,
    }
  }
}

/// Result of a successful build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildSummary {
  pub scope: String,
  /// Labels of the scope the build ran for.
  #[serde(skip_serializing_if = "BTreeMap::is_empty")]
  pub labels: BTreeMap<String, String>,
  /// Artifact ids in completion order.
  pub initialized: Vec<String>,
  pub elapsed: Duration,
}
