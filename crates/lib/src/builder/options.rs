use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::consts::{BUILD_TIMEOUT_ENV, LUA_DEFINITION_EXT, SKIP_CYCLE_CHECK_ENV};

/// How a [`Builder`](super::Builder) walks and initializes a tree.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOptions {
  /// Root directory of the definition tree.
  pub root: PathBuf,
  /// Extension of definition files, for Lua builders.
  pub extension: String,
  /// Upper bound on a whole build, discovery included. `None` waits forever.
  pub timeout: Option<Duration>,
  /// Reject declared dependency cycles before initializing anything.
  pub check_cycles: bool,
}

impl Default for BuildOptions {
  fn default() -> Self {
    Self {
      root: PathBuf::from("."),
      extension: LUA_DEFINITION_EXT.to_string(),
      timeout: None,
      check_cycles: true,
    }
  }
}

impl BuildOptions {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self {
      root: root.into(),
      ..Self::default()
    }
  }

  /// Options for `root` with environment overrides applied.
  ///
  /// - `ARBOR_BUILD_TIMEOUT`: timeout in seconds (fractions allowed)
  /// - `ARBOR_SKIP_CYCLE_CHECK`: `1`, `true` or `yes` disables the cycle check
  pub fn from_env(root: impl Into<PathBuf>) -> Self {
    let mut options = Self::new(root);

    if let Ok(raw) = std::env::var(BUILD_TIMEOUT_ENV) {
      match raw.trim().parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs > 0.0 => options.timeout = Some(Duration::from_secs_f64(secs)),
        _ => warn!(var = BUILD_TIMEOUT_ENV, value = %raw, "ignoring invalid build timeout"),
      }
    }

    if let Ok(raw) = std::env::var(SKIP_CYCLE_CHECK_ENV) {
      let skip = matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
      options.check_cycles = !skip;
    }

    options
  }

  pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.timeout = timeout;
    self
  }

  pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
    self.extension = extension.into();
    self
  }

  pub fn with_cycle_check(mut self, check_cycles: bool) -> Self {
    self.check_cycles = check_cycles;
    self
  }
}
