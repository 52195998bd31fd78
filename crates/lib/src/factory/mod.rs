//! Artifact factories.
//!
//! An [`ArtifactFactory`] wraps a single artifact definition and turns its
//! asynchronous initializer into a per-scope, memoized, awaitable value. Any
//! number of call sites can ask a factory for a scope's artifact through
//! [`ArtifactFactory::get_construct`], including before [`ArtifactFactory::init`]
//! has been called for that scope; they all observe the same instance (or the
//! same failure) once initialization settles.
//!
//! This is what lets artifacts found in one unordered tree walk depend on each
//! other: an initializer simply awaits the handles of the artifacts it needs.
//! Cycles are not detected here; a cycle leaves the involved handles pending.
//!
//! # Submodules
//!
//! - `record` - Per-scope resolution records and [`ConstructHandle`]
//! - `types` - [`FactoryError`] and the initializer error type

mod record;
mod types;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::descriptor::PathDescriptor;
use crate::scope::{Configuration, Scope};

use record::ResolutionRecord;

pub use record::{ConstructHandle, Resolution};
pub use types::{BoxError, FactoryError};

/// The extension point of a factory: how an artifact is built for a scope.
#[async_trait]
pub trait Initialize: Send + Sync + 'static {
  /// The artifact produced for each scope.
  type Artifact: Send + Sync + 'static;

  /// Ids of artifacts this one awaits, when known up front.
  ///
  /// Only used for the build-time cycle check; initializers may still await
  /// factories they did not declare.
  fn dependencies(&self) -> Vec<String> {
    Vec::new()
  }

  /// Build the artifact for `scope`.
  ///
  /// Receives its own copy of the configuration. The default implementation
  /// fails with [`FactoryError::NotImplemented`].
  async fn initialize(
    &self,
    scope: &Scope,
    id: &str,
    directory: &PathDescriptor,
    config: Configuration,
  ) -> Result<Self::Artifact, BoxError> {
    let _ = (scope, directory, config);
    Err(FactoryError::NotImplemented { id: id.to_string() }.into())
  }
}

/// Wraps one artifact definition and memoizes its initialization per scope.
pub struct ArtifactFactory<I: Initialize> {
  id: String,
  initializer: I,
  records: Mutex<HashMap<String, ResolutionRecord<I::Artifact>>>,
}

impl<I: Initialize> ArtifactFactory<I> {
  /// Create a factory. Fails with `InvalidArgument` if `id` is blank.
  pub fn new(id: impl Into<String>, initializer: I) -> Result<Self, FactoryError> {
    let id = id.into();
    if id.trim().is_empty() {
      return Err(FactoryError::InvalidArgument("factory id must not be empty".to_string()));
    }
    Ok(Self {
      id,
      initializer,
      records: Mutex::new(HashMap::new()),
    })
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn initializer(&self) -> &I {
    &self.initializer
  }

  /// Run `f` against the scope's record, creating it if this is the first
  /// request for the scope. The lock is never held across an await.
  fn with_record<R>(&self, scope: &Scope, f: impl FnOnce(&mut ResolutionRecord<I::Artifact>) -> R) -> R {
    let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
    let record = records
      .entry(scope.key().to_string())
      .or_insert_with(ResolutionRecord::new);
    f(record)
  }

  /// Initialize the artifact for `scope`.
  ///
  /// Succeeds at most once per scope: any later call, whether the first one
  /// is still running, succeeded, or failed, fails with
  /// [`FactoryError::AlreadyInitialized`]. A failure is stored permanently
  /// and returned to every waiter of the scope.
  pub async fn init(
    &self,
    scope: &Scope,
    directory: &PathDescriptor,
    config: &Configuration,
  ) -> Result<Arc<I::Artifact>, FactoryError> {
    let slot = self
      .with_record(scope, |record| record.begin(&self.id, scope.key()))
      .ok_or_else(|| FactoryError::AlreadyInitialized {
        id: self.id.clone(),
        scope: scope.key().to_string(),
      })?;

    debug!(artifact = %self.id, scope = %scope, dir = %directory, "initializing artifact");

    match self
      .initializer
      .initialize(scope, &self.id, directory, config.clone())
      .await
    {
      Ok(artifact) => {
        debug!(artifact = %self.id, scope = %scope, "artifact resolved");
        Ok(slot.resolve(artifact))
      }
      Err(err) => {
        let err = FactoryError::from_initializer(&self.id, scope, err);
        warn!(artifact = %self.id, scope = %scope, error = %err, "artifact failed to initialize");
        slot.fail(err.clone());
        Err(err)
      }
    }
  }

  /// Get an awaitable handle to the artifact for `scope`.
  ///
  /// Never fails and never starts initialization: if `init` has not run for
  /// the scope yet, the handle stays pending until it does.
  pub fn get_construct(&self, scope: &Scope) -> ConstructHandle<I::Artifact> {
    self.with_record(scope, |record| record.handle(&self.id, scope.key()))
  }

  /// Current resolution state for `scope`, without creating a record.
  pub fn resolution(&self, scope: &Scope) -> Option<Resolution<I::Artifact>> {
    let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
    records.get(scope.key()).map(ResolutionRecord::state)
  }
}

impl<I: Initialize> std::fmt::Debug for ArtifactFactory<I> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ArtifactFactory").field("id", &self.id).finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use tokio::sync::oneshot;

  use super::*;

  /// Initializer whose outcome is decided by the test through a channel.
  struct Gated {
    gate: Mutex<Option<oneshot::Receiver<Result<String, String>>>>,
    calls: Mutex<Vec<(String, String, Configuration)>>,
  }

  impl Gated {
    fn new() -> (Self, oneshot::Sender<Result<String, String>>) {
      let (tx, rx) = oneshot::channel();
      let gated = Self {
        gate: Mutex::new(Some(rx)),
        calls: Mutex::new(Vec::new()),
      };
      (gated, tx)
    }
  }

  #[async_trait]
  impl Initialize for Gated {
    type Artifact = String;

    async fn initialize(
      &self,
      scope: &Scope,
      id: &str,
      _directory: &PathDescriptor,
      config: Configuration,
    ) -> Result<String, BoxError> {
      self
        .calls
        .lock()
        .unwrap()
        .push((scope.key().to_string(), id.to_string(), config));
      let gate = self.gate.lock().unwrap().take();
      match gate {
        Some(rx) => match rx.await {
          Ok(Ok(value)) => Ok(value),
          Ok(Err(message)) => Err(message.into()),
          Err(_) => Err("gate dropped".into()),
        },
        None => Ok(format!("{}@{}", id, scope)),
      }
    }
  }

  /// Initializer that resolves immediately.
  struct Immediate;

  #[async_trait]
  impl Initialize for Immediate {
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

  /// Initializer that relies on the default implementation.
  struct Unimplemented;

  impl Initialize for Unimplemented {
    type Artifact = ();
  }

  fn scope(name: &str) -> Scope {
    Scope::new(name).unwrap()
  }

  fn dir() -> PathDescriptor {
    PathDescriptor::new("defs/api").unwrap()
  }

  fn assert_pending<T>(handle: &ConstructHandle<T>) {
    assert!(handle.peek().is_pending(), "handle should still be pending");
  }

  mod construction {
    use super::*;

    #[test]
    fn rejects_blank_id() {
      for id in ["", "  "] {
        let err = ArtifactFactory::new(id, Immediate).unwrap_err();
        assert!(matches!(err, FactoryError::InvalidArgument(_)));
      }
    }

    #[test]
    fn exposes_id() {
      let factory = ArtifactFactory::new("table", Immediate).unwrap();
      assert_eq!(factory.id(), "table");
      assert!(factory.resolution(&scope("dev")).is_none());
    }
  }

  mod init {
    use super::*;

    #[tokio::test]
    async fn passes_scope_id_and_config_copy_to_initializer() {
      let (gated, tx) = Gated::new();
      let factory = ArtifactFactory::new("fn", gated).unwrap();
      let mut config = Configuration::new();
      config.insert("stage".to_string(), serde_json::json!("dev"));

      tx.send(Ok("done".to_string())).unwrap();
      factory.init(&scope("dev"), &dir(), &config).await.unwrap();

      let calls = factory.initializer().calls.lock().unwrap();
      assert_eq!(calls.len(), 1);
      assert_eq!(calls[0].0, "dev");
      assert_eq!(calls[0].1, "fn");
      assert_eq!(calls[0].2, config);
    }

    #[tokio::test]
    async fn second_init_for_same_scope_fails() {
      let factory = ArtifactFactory::new("fn", Immediate).unwrap();
      let dev = scope("dev");
      let config = Configuration::new();

      let first = factory.init(&dev, &dir(), &config).await.unwrap();
      let err = factory.init(&dev, &dir(), &config).await.unwrap_err();

      assert!(matches!(err, FactoryError::AlreadyInitialized { ref scope, .. } if scope == "dev"));
      let resolved = factory.get_construct(&dev).await.unwrap();
      assert!(Arc::ptr_eq(&first, &resolved));
    }

    #[tokio::test]
    async fn second_init_while_in_flight_fails() {
      let (gated, tx) = Gated::new();
      let factory = Arc::new(ArtifactFactory::new("fn", gated).unwrap());
      let dev = scope("dev");

      let first = {
        let factory = Arc::clone(&factory);
        let dev = dev.clone();
        tokio::spawn(async move { factory.init(&dev, &dir(), &Configuration::new()).await })
      };
      tokio::task::yield_now().await;
      while factory.initializer().calls.lock().unwrap().is_empty() {
        tokio::task::yield_now().await;
      }

      let err = factory.init(&dev, &dir(), &Configuration::new()).await.unwrap_err();
      assert!(matches!(err, FactoryError::AlreadyInitialized { .. }));

      tx.send(Ok("value".to_string())).unwrap();
      assert_eq!(*first.await.unwrap().unwrap(), "value");
    }

    #[tokio::test]
    async fn failed_scope_stays_failed() {
      let (gated, tx) = Gated::new();
      let factory = ArtifactFactory::new("fn", gated).unwrap();
      let dev = scope("dev");

      tx.send(Err("something went wrong!".to_string())).unwrap();
      let err = factory.init(&dev, &dir(), &Configuration::new()).await.unwrap_err();
      assert!(err.to_string().contains("something went wrong!"));

      let retry = factory.init(&dev, &dir(), &Configuration::new()).await.unwrap_err();
      assert!(matches!(retry, FactoryError::AlreadyInitialized { .. }));
      assert!(factory.resolution(&dev).unwrap().is_failed());
    }

    #[tokio::test]
    async fn default_initializer_is_not_implemented() {
      let factory = ArtifactFactory::new("abstract", Unimplemented).unwrap();
      let err = factory
        .init(&scope("dev"), &dir(), &Configuration::new())
        .await
        .unwrap_err();
      assert!(matches!(err, FactoryError::NotImplemented { ref id } if id == "abstract"));
    }

    #[tokio::test]
    async fn scopes_are_initialized_independently() {
      let factory = ArtifactFactory::new("fn", Immediate).unwrap();
      let config = Configuration::new();

      factory.init(&scope("dev"), &dir(), &config).await.unwrap();
      factory.init(&scope("prod"), &dir(), &config).await.unwrap();

      assert_eq!(*factory.get_construct(&scope("dev")).await.unwrap(), "fn@dev");
      assert_eq!(*factory.get_construct(&scope("prod")).await.unwrap(), "fn@prod");
    }

    #[tokio::test]
    async fn cancelled_init_abandons_waiters() {
      let (gated, _tx) = Gated::new();
      let factory = ArtifactFactory::new("fn", gated).unwrap();
      let dev = scope("dev");
      let handle = factory.get_construct(&dev);

      let result = tokio::time::timeout(
        Duration::from_millis(20),
        factory.init(&dev, &dir(), &Configuration::new()),
      )
      .await;
      assert!(result.is_err(), "init should still be waiting on its gate");

      let err = handle.await.unwrap_err();
      assert!(matches!(err, FactoryError::Abandoned { .. }));
    }
  }

  mod get_construct {
    use super::*;

    #[tokio::test]
    async fn pending_until_init_completes() {
      let (gated, tx) = Gated::new();
      let factory = ArtifactFactory::new("fn", gated).unwrap();
      let dev = scope("dev");

      let handle = factory.get_construct(&dev);
      assert_pending(&handle);
      assert!(factory.resolution(&dev).unwrap().is_pending());

      let (directory, config) = (dir(), Configuration::new());
      let init = factory.init(&dev, &directory, &config);
      tx.send(Ok("ready".to_string())).unwrap();
      init.await.unwrap();

      assert_eq!(*handle.await.unwrap(), "ready");
    }

    #[tokio::test]
    async fn never_settles_without_init() {
      let factory = ArtifactFactory::new("fn", Immediate).unwrap();
      let handle = factory.get_construct(&scope("dev"));

      let waited = tokio::time::timeout(Duration::from_millis(20), handle.wait()).await;
      assert!(waited.is_err(), "handle must not settle without init");
    }

    #[tokio::test]
    async fn handles_for_different_scopes_are_independent() {
      let factory = ArtifactFactory::new("fn", Immediate).unwrap();
      let dev = factory.get_construct(&scope("dev"));
      let prod = factory.get_construct(&scope("prod"));

      factory.init(&scope("dev"), &dir(), &Configuration::new()).await.unwrap();

      assert!(dev.peek().is_resolved());
      assert_pending(&prod);
    }

    #[tokio::test]
    async fn failure_rejects_every_handle() {
      let (gated, tx) = Gated::new();
      let factory = ArtifactFactory::new("fn", gated).unwrap();
      let dev = scope("dev");
      let early = factory.get_construct(&dev);

      tx.send(Err("boom".to_string())).unwrap();
      let init_err = factory.init(&dev, &dir(), &Configuration::new()).await.unwrap_err();

      let early_err = early.await.unwrap_err();
      let late_err = factory.get_construct(&dev).await.unwrap_err();
      assert_eq!(early_err.to_string(), init_err.to_string());
      assert_eq!(late_err.to_string(), init_err.to_string());
    }

    #[tokio::test]
    async fn dependency_failure_propagates_verbatim() {
      let (gated, tx) = Gated::new();
      let upstream = Arc::new(ArtifactFactory::new("table", gated).unwrap());

      struct Dependent(Arc<ArtifactFactory<Gated>>);

      #[async_trait]
      impl Initialize for Dependent {
        type Artifact = String;

        async fn initialize(
          &self,
          scope: &Scope,
          _id: &str,
          _directory: &PathDescriptor,
          _config: Configuration,
        ) -> Result<String, BoxError> {
          let table = self.0.get_construct(scope).await?;
          Ok(format!("reads {}", table))
        }
      }

      let dependent = ArtifactFactory::new("lambda", Dependent(Arc::clone(&upstream))).unwrap();
      let dev = scope("dev");

      let (directory, config) = (dir(), Configuration::new());

      tx.send(Err("table exploded".to_string())).unwrap();
      let (upstream_result, dependent_result) = tokio::join!(
        upstream.init(&dev, &directory, &config),
        dependent.init(&dev, &directory, &config),
      );

      assert!(upstream_result.is_err());
      let err = dependent_result.unwrap_err();
      assert_eq!(err.artifact_id(), Some("table"));
      assert!(err.to_string().contains("table exploded"));
    }
  }
}
