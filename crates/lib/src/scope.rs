//! Build scopes and the configuration bag handed to initializers.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::factory::FactoryError;

/// Flat key/value configuration shared with every artifact initializer.
///
/// Each initializer receives its own clone, so artifacts cannot observe each
/// other's modifications.
pub type Configuration = BTreeMap<String, serde_json::Value>;

/// A build target or environment. The unit of memoization for resolution.
///
/// The scope's name is its identity key: two scopes with the same name share
/// resolution records inside every factory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scope {
  name: String,
  labels: BTreeMap<String, String>,
}

impl Scope {
  /// Create a scope. Fails with `InvalidArgument` if `name` is blank.
  pub fn new(name: impl Into<String>) -> Result<Self, FactoryError> {
    let name = name.into();
    if name.trim().is_empty() {
      return Err(FactoryError::InvalidArgument("scope name must not be empty".to_string()));
    }
    Ok(Self {
      name,
      labels: BTreeMap::new(),
    })
  }

  /// Attach a descriptive label (e.g. region, account). Labels do not
  /// participate in the scope's identity.
  pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.labels.insert(key.into(), value.into());
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// The identity key used to index resolution records.
  pub fn key(&self) -> &str {
    &self.name
  }

  pub fn labels(&self) -> &BTreeMap<String, String> {
    &self.labels
  }
}

impl fmt::Display for Scope {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.name)
  }
}
