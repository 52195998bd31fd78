//! Directory descriptors.
//!
//! A [`PathDescriptor`] identifies a directory's position in the definition
//! tree. It is an immutable value: children are derived, never mutated into
//! place, and every path it exposes is lexically normalized (no `.` or `..`
//! segments) without touching the filesystem.
//!
//! Descriptors also compute *routes*: forward-slash paths relative to an
//! arbitrary ancestor, used to give an artifact an external-facing address
//! that does not depend on the host's path separator.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// Errors produced while building or querying a descriptor.
#[derive(Debug, Error)]
pub enum PathError {
  /// A required argument was empty.
  #[error("invalid argument: {0}")]
  InvalidArgument(&'static str),

  /// The base path has more segments than the descriptor's absolute path.
  #[error("base path '{base}' has more levels than '{path}'")]
  BaseTooDeep { base: PathBuf, path: PathBuf },

  /// The base path is not a prefix of the descriptor's absolute path.
  #[error("base path '{base}' does not exist in '{path}'")]
  BaseMismatch { base: PathBuf, path: PathBuf },

  /// The working directory needed to absolutize a relative path is unavailable.
  #[error("cannot resolve working directory: {0}")]
  WorkingDir(#[source] std::io::Error),
}

/// An immutable description of a directory in the definition tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PathDescriptor {
  name: String,
  path: PathBuf,
  absolute_path: PathBuf,
  parent_path: PathBuf,
}

impl PathDescriptor {
  /// Create a descriptor from a relative or absolute path.
  ///
  /// Relative paths are resolved against the current working directory for
  /// [`absolute_path`](Self::absolute_path) and
  /// [`parent_path`](Self::parent_path), while [`path`](Self::path) keeps the
  /// form it was given in.
  pub fn new(path: impl AsRef<Path>) -> Result<Self, PathError> {
    let raw = path.as_ref();
    if raw.as_os_str().is_empty() {
      return Err(PathError::InvalidArgument("path must not be empty"));
    }

    let path = normalize(raw);
    let absolute_path = absolutize(&path)?;
    let parent_path = absolute_path
      .parent()
      .map(Path::to_path_buf)
      .unwrap_or_else(|| absolute_path.clone());
    let name = match path.components().next_back() {
      Some(Component::Normal(n)) => n.to_string_lossy().into_owned(),
      Some(Component::CurDir) => ".".to_string(),
      Some(Component::ParentDir) => "..".to_string(),
      _ => String::new(),
    };

    Ok(Self {
      name,
      path,
      absolute_path,
      parent_path,
    })
  }

  /// The last segment of the normalized path.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// The normalized path, relative or absolute as originally given.
  pub fn path(&self) -> &Path {
    &self.path
  }

  /// The normalized absolute path.
  pub fn absolute_path(&self) -> &Path {
    &self.absolute_path
  }

  /// The normalized absolute path of the parent directory.
  pub fn parent_path(&self) -> &Path {
    &self.parent_path
  }

  /// Derive the descriptor of a child directory.
  ///
  /// Leading separators in `name` are ignored, so the child always lands
  /// below this directory.
  pub fn create_child(&self, name: impl AsRef<Path>) -> Result<Self, PathError> {
    let name: PathBuf = name
      .as_ref()
      .components()
      .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
      .collect();
    if name.as_os_str().is_empty() {
      return Err(PathError::InvalidArgument("child name must not be empty"));
    }
    Self::new(self.path.join(name))
  }

  /// Compute the route of this directory relative to `base`.
  ///
  /// `base` is absolutized and normalized first. The result always uses `/`
  /// and always starts with `/`; a descriptor equal to its base yields `/`.
  pub fn route_relative_to(&self, base: impl AsRef<Path>) -> Result<String, PathError> {
    let base = base.as_ref();
    if base.as_os_str().is_empty() {
      return Err(PathError::InvalidArgument("base path must not be empty"));
    }

    let base = absolutize(&normalize(base))?;
    let base_segments = segments(&base);
    let own_segments = segments(&self.absolute_path);

    if base_segments.len() > own_segments.len() {
      return Err(PathError::BaseTooDeep {
        base,
        path: self.absolute_path.clone(),
      });
    }

    let is_prefix = base_segments
      .iter()
      .zip(own_segments.iter())
      .all(|(b, o)| segment_eq(b, o));
    if !is_prefix {
      return Err(PathError::BaseMismatch {
        base,
        path: self.absolute_path.clone(),
      });
    }

    Ok(format!("/{}", own_segments[base_segments.len()..].join("/")))
  }
}

impl fmt::Display for PathDescriptor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.path.display())
  }
}

/// Lexically normalize a path, dropping `.` and folding `..` into its parent.
///
/// Leading `..` segments of relative paths are kept; `..` at the root is
/// discarded. An empty result becomes `.`.
fn normalize(path: &Path) -> PathBuf {
  let mut out: Vec<Component<'_>> = Vec::new();

  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => match out.last() {
        Some(Component::Normal(_)) => {
          out.pop();
        }
        Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
        _ => out.push(component),
      },
      other => out.push(other),
    }
  }

  if out.is_empty() {
    return PathBuf::from(".");
  }
  out.iter().collect()
}

fn absolutize(path: &Path) -> Result<PathBuf, PathError> {
  if path.is_absolute() {
    return Ok(normalize(path));
  }
  let cwd = std::env::current_dir().map_err(PathError::WorkingDir)?;
  Ok(normalize(&cwd.join(path)))
}

/// Split an absolute path into comparable segments; the root is not a segment.
fn segments(path: &Path) -> Vec<String> {
  path
    .components()
    .filter_map(|c| match c {
      Component::Prefix(p) => Some(p.as_os_str().to_string_lossy().into_owned()),
      Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
      _ => None,
    })
    .collect()
}

#[cfg(windows)]
fn segment_eq(a: &str, b: &str) -> bool {
  a.eq_ignore_ascii_case(b)
}

#[cfg(not(windows))]
fn segment_eq(a: &str, b: &str) -> bool {
  a == b
}
