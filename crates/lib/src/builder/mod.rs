//! Discovering and building a definition tree.
//!
//! A [`Builder`] is bound to a root directory and a [`DefinitionLoader`].
//! [`Builder::build`] discovers every factory below the root and initializes
//! all of them concurrently for one scope. There is no ordering between
//! initializations beyond what initializers impose themselves by awaiting
//! each other's construct handles.
//!
//! The two phases are also available separately: [`Builder::discover`]
//! returns the working set, which can be passed to [`Builder::initialize`]
//! once per scope.
//!
//! # Submodules
//!
//! - [`graph`] - Declared dependency graph and cycle check
//! - `options` - [`BuildOptions`]
//! - `types` - [`BuildError`] and [`BuildSummary`]

pub mod graph;
mod options;
mod types;

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::descriptor::PathDescriptor;
use crate::discover::{self, DefinitionLoader, Discovered};
use crate::kinds::KindRegistry;
use crate::lua::LuaLoader;
use crate::scope::{Configuration, Scope};

use graph::DependencyGraph;

pub use options::BuildOptions;
pub use types::{BuildError, BuildSummary};

pub struct Builder {
  root: PathDescriptor,
  loader: Arc<dyn DefinitionLoader>,
  options: BuildOptions,
}

impl Builder {
  /// Create a builder for `options.root`. Fails if the root path is empty.
  pub fn new(options: BuildOptions, loader: Arc<dyn DefinitionLoader>) -> Result<Self, BuildError> {
    let root = PathDescriptor::new(&options.root)?;
    Ok(Self { root, loader, options })
  }

  /// A builder loading Lua definitions with the given kinds.
  pub fn lua(options: BuildOptions, kinds: KindRegistry) -> Result<Self, BuildError> {
    let loader = LuaLoader::new(kinds).with_extension(options.extension.clone());
    Self::new(options, Arc::new(loader))
  }

  pub fn root(&self) -> &PathDescriptor {
    &self.root
  }

  pub fn options(&self) -> &BuildOptions {
    &self.options
  }

  /// Walk the tree and return every discovered factory with its directory.
  pub async fn discover(&self) -> Result<Vec<Discovered>, BuildError> {
    Ok(discover::discover(&self.root, Arc::clone(&self.loader)).await?)
  }

  /// Discover the tree and initialize everything in it for `scope`.
  ///
  /// The configured timeout covers both phases.
  pub async fn build(&self, scope: &Scope, config: &Configuration) -> Result<BuildSummary, BuildError> {
    info!(root = %self.root, scope = %scope, "starting build");
    let started = Instant::now();

    let working_set = match self.options.timeout {
      Some(timeout) => tokio::time::timeout_at(started + timeout, self.discover())
        .await
        .map_err(|_| {
          error!(root = %self.root, ?timeout, "discovery timed out");
          BuildError::DiscoveryTimedOut {
            root: self.root.absolute_path().to_path_buf(),
            timeout,
          }
        })??,
      None => self.discover().await?,
    };
    self.initialize_from(started, scope, config, working_set).await
  }

  /// Initialize a previously discovered working set for `scope`.
  ///
  /// Every factory is initialized on its own task with its own copy of
  /// `config`. Returns the first failure observed; the remaining tasks are
  /// left running so artifacts that do not depend on the failure still
  /// resolve. If the configured timeout elapses first, the pending tasks are
  /// cancelled and their waiters see the initialization as abandoned.
  pub async fn initialize(
    &self,
    scope: &Scope,
    config: &Configuration,
    working_set: Vec<Discovered>,
  ) -> Result<BuildSummary, BuildError> {
    self.initialize_from(Instant::now(), scope, config, working_set).await
  }

  async fn initialize_from(
    &self,
    started: Instant,
    scope: &Scope,
    config: &Configuration,
    working_set: Vec<Discovered>,
  ) -> Result<BuildSummary, BuildError> {
    if self.options.check_cycles {
      let graph = DependencyGraph::from_discovered(&working_set);
      graph.verify_acyclic()?;
      for (id, dependency) in graph.missing() {
        warn!(artifact = %id, dependency = %dependency, "declared dependency was not discovered");
      }
    }

    info!(scope = %scope, artifact_count = working_set.len(), "initializing artifacts");

    let mut pending: Vec<String> = working_set.iter().map(|d| d.id().to_string()).collect();
    let mut tasks = JoinSet::new();
    for discovered in working_set {
      let scope = scope.clone();
      let config = config.clone();
      tasks.spawn(async move {
        let result = discovered.factory.init(&scope, &discovered.directory, &config).await;
        (discovered.id().to_string(), result)
      });
    }

    let deadline = self.options.timeout.map(|timeout| (started + timeout, timeout));
    let mut initialized = Vec::with_capacity(pending.len());

    loop {
      let joined = match deadline {
        Some((at, timeout)) => match tokio::time::timeout_at(at, tasks.join_next()).await {
          Ok(joined) => joined,
          Err(_) => {
            pending.sort();
            error!(scope = %scope, pending = ?pending, "build timed out");
            return Err(BuildError::TimedOut {
              scope: scope.name().to_string(),
              timeout,
              pending,
            });
          }
        },
        None => tasks.join_next().await,
      };

      let Some(joined) = joined else {
        break;
      };
      let (id, result) = match joined {
        Ok(outcome) => outcome,
        Err(e) => {
          tasks.detach_all();
          return Err(e.into());
        }
      };
      if let Some(pos) = pending.iter().position(|p| *p == id) {
        pending.swap_remove(pos);
      }

      match result {
        Ok(()) => {
          debug!(artifact = %id, scope = %scope, "artifact built");
          initialized.push(id);
        }
        Err(source) => {
          error!(artifact = %id, scope = %scope, error = %source, "build failed");
          tasks.detach_all();
          return Err(BuildError::Initialization { id, source });
        }
      }
    }

    let summary = BuildSummary {
      scope: scope.name().to_string(),
      labels: scope.labels().clone(),
      initialized,
      elapsed: started.elapsed(),
    };
    info!(
      scope = %scope,
      initialized = summary.initialized.len(),
      elapsed_ms = summary.elapsed.as_millis() as u64,
      "build complete"
    );
    Ok(summary)
  }
}

impl std::fmt::Debug for Builder {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Builder")
      .field("root", &self.root)
      .field("options", &self.options)
      .finish_non_exhaustive()
  }
}
