//! Error types shared by factories and their waiters.

use std::error::Error;
use std::sync::Arc;

use thiserror::Error;

use crate::scope::Scope;

/// Boxed error returned by artifact initializers.
///
/// Initializers may fail with any error type; `?` converts it into this box.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Errors raised by an [`ArtifactFactory`](super::ArtifactFactory).
///
/// The type is cheap to clone: a failed resolution hands the same error to
/// every waiter of that scope.
#[derive(Debug, Clone, Error)]
pub enum FactoryError {
  /// Malformed call-site input, detected before any state change.
  #[error("invalid argument: {0}")]
  InvalidArgument(String),

  /// `init` was called a second time for the same scope.
  #[error("artifact '{id}' has already been initialized for scope [{scope}]")]
  AlreadyInitialized { id: String, scope: String },

  /// The factory never provided an initializer.
  #[error("artifact '{id}' does not implement an initializer")]
  NotImplemented { id: String },

  /// The artifact's own initializer failed.
  #[error("artifact '{id}' failed to initialize for scope [{scope}]: {source}")]
  Initialization {
    id: String,
    scope: String,
    #[source]
    source: Arc<dyn Error + Send + Sync>,
  },

  /// The initialization was dropped before it settled, or the factory went
  /// away while a waiter was still pending.
  #[error("initialization of artifact '{id}' for scope [{scope}] was abandoned")]
  Abandoned { id: String, scope: String },
}

impl FactoryError {
  /// Wrap an initializer failure.
  ///
  /// A `FactoryError` surfacing from an initializer (for example a failed
  /// dependency await) is kept verbatim so the root cause stays visible.
  pub(crate) fn from_initializer(id: &str, scope: &Scope, err: BoxError) -> Self {
    match err.downcast::<FactoryError>() {
      Ok(inner) => *inner,
      Err(other) => FactoryError::Initialization {
        id: id.to_string(),
        scope: scope.key().to_string(),
        source: Arc::from(other),
      },
    }
  }

  pub(crate) fn abandoned(id: &str, scope: &str) -> Self {
    FactoryError::Abandoned {
      id: id.to_string(),
      scope: scope.to_string(),
    }
  }

  /// The id of the artifact this error is about, when it names one.
  pub fn artifact_id(&self) -> Option<&str> {
    match self {
      FactoryError::InvalidArgument(_) => None,
      FactoryError::AlreadyInitialized { id, .. }
      | FactoryError::NotImplemented { id }
      | FactoryError::Initialization { id, .. }
      | FactoryError::Abandoned { id, .. } => Some(id),
    }
  }
}
