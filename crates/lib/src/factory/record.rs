//! Per-scope resolution records and the handles used to await them.

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::watch;

use super::FactoryError;

/// Observable state of a resolution record.
#[derive(Debug)]
pub enum Resolution<T> {
  /// No instance yet; the handle has not settled.
  Pending,
  /// Initialization succeeded.
  Resolved(Arc<T>),
  /// Initialization failed; the failure is permanent for this scope.
  Failed(FactoryError),
}

impl<T> Clone for Resolution<T> {
  fn clone(&self) -> Self {
    match self {
      Resolution::Pending => Resolution::Pending,
      Resolution::Resolved(artifact) => Resolution::Resolved(Arc::clone(artifact)),
      Resolution::Failed(err) => Resolution::Failed(err.clone()),
    }
  }
}

impl<T> Resolution<T> {
  pub fn is_pending(&self) -> bool {
    matches!(self, Resolution::Pending)
  }

  pub fn is_resolved(&self) -> bool {
    matches!(self, Resolution::Resolved(_))
  }

  pub fn is_failed(&self) -> bool {
    matches!(self, Resolution::Failed(_))
  }

  /// The resolved instance, if any.
  pub fn instance(&self) -> Option<&Arc<T>> {
    match self {
      Resolution::Resolved(artifact) => Some(artifact),
      _ => None,
    }
  }
}

/// State for one (factory, scope) pair.
///
/// `started` flips once, when `init` claims the record; the watch channel
/// carries the settled value to every handle.
pub(crate) struct ResolutionRecord<T> {
  sender: Arc<watch::Sender<Resolution<T>>>,
  started: bool,
}

impl<T> ResolutionRecord<T> {
  pub(crate) fn new() -> Self {
    let (sender, _) = watch::channel(Resolution::Pending);
    Self {
      sender: Arc::new(sender),
      started: false,
    }
  }

  /// Claim the record for initialization. Returns `None` if it was already
  /// claimed, whatever state that earlier attempt reached.
  pub(crate) fn begin(&mut self, id: &str, scope: &str) -> Option<InitSlot<T>> {
    if self.started {
      return None;
    }
    self.started = true;
    Some(InitSlot {
      sender: Arc::clone(&self.sender),
      id: id.to_string(),
      scope: scope.to_string(),
      settled: false,
    })
  }

  pub(crate) fn state(&self) -> Resolution<T> {
    self.sender.borrow().clone()
  }

  pub(crate) fn handle(&self, id: &str, scope: &str) -> ConstructHandle<T> {
    ConstructHandle {
      id: id.to_string(),
      scope: scope.to_string(),
      receiver: self.sender.subscribe(),
    }
  }
}

/// Exclusive right to settle a record, handed out once per scope.
///
/// Dropping the slot without settling (for example when the `init` future is
/// cancelled) fails the record with [`FactoryError::Abandoned`] so waiters do
/// not hang on an initialization that can no longer finish.
pub(crate) struct InitSlot<T> {
  sender: Arc<watch::Sender<Resolution<T>>>,
  id: String,
  scope: String,
  settled: bool,
}

impl<T> InitSlot<T> {
  pub(crate) fn resolve(mut self, artifact: T) -> Arc<T> {
    let artifact = Arc::new(artifact);
    self.settle(Resolution::Resolved(Arc::clone(&artifact)));
    artifact
  }

  pub(crate) fn fail(mut self, err: FactoryError) {
    self.settle(Resolution::Failed(err));
  }

  fn settle(&mut self, state: Resolution<T>) {
    self.settled = true;
    self.sender.send_replace(state);
  }
}

impl<T> Drop for InitSlot<T> {
  fn drop(&mut self) {
    if !self.settled {
      self
        .sender
        .send_replace(Resolution::Failed(FactoryError::abandoned(&self.id, &self.scope)));
    }
  }
}

/// Awaitable view of one scope's resolution.
///
/// Obtainable before initialization has started; awaiting it completes once
/// the record settles. If `init` is never called for the scope the handle
/// never completes, so callers that need a bound should wrap it in a timeout.
pub struct ConstructHandle<T> {
  id: String,
  scope: String,
  receiver: watch::Receiver<Resolution<T>>,
}

impl<T> ConstructHandle<T> {
  /// The id of the artifact this handle resolves.
  pub fn id(&self) -> &str {
    &self.id
  }

  /// The scope this handle resolves for.
  pub fn scope(&self) -> &str {
    &self.scope
  }

  /// Current state without waiting.
  pub fn peek(&self) -> Resolution<T> {
    self.receiver.borrow().clone()
  }

  /// Wait for the record to settle.
  pub async fn wait(mut self) -> Result<Arc<T>, FactoryError> {
    let settled = self
      .receiver
      .wait_for(|state| !state.is_pending())
      .await
      .map(|state| (*state).clone());

    match settled.unwrap_or(Resolution::Pending) {
      Resolution::Resolved(artifact) => Ok(artifact),
      Resolution::Failed(err) => Err(err),
      Resolution::Pending => Err(FactoryError::abandoned(&self.id, &self.scope)),
    }
  }
}

impl<T: Send + Sync + 'static> IntoFuture for ConstructHandle<T> {
  type Output = Result<Arc<T>, FactoryError>;
  type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

  fn into_future(self) -> Self::IntoFuture {
    Box::pin(self.wait())
  }
}
