//! Lua definition files.
//!
//! A definition is a Lua chunk that returns a table. If the table carries a
//! `kind` known to the [`KindRegistry`] it becomes a factory; any other return
//! value is an unrelated export and is skipped by discovery.
//!
//! # Submodules
//!
//! - [`loaders`] - File evaluation with `__dir` injection
//! - [`runtime`] - Lua state setup and the `arbor` global

pub mod loaders;
pub mod runtime;

use std::path::Path;
use std::sync::Arc;

use mlua::prelude::*;
use tracing::debug;

use crate::consts::LUA_DEFINITION_EXT;
use crate::descriptor::PathDescriptor;
use crate::discover::{DefinitionLoader, Discoverable, LoadError};
use crate::kinds::{Definition, KindRegistry};

/// Loads `*.lua` definition files.
///
/// Every file is evaluated in a fresh Lua state, so definitions cannot leak
/// globals into each other.
#[derive(Debug, Clone)]
pub struct LuaLoader {
  kinds: KindRegistry,
  extension: String,
}

impl LuaLoader {
  pub fn new(kinds: KindRegistry) -> Self {
    Self {
      kinds,
      extension: LUA_DEFINITION_EXT.to_string(),
    }
  }

  /// Match files with `extension` instead of `lua`.
  pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
    self.extension = extension.into();
    self
  }
}

impl DefinitionLoader for LuaLoader {
  fn matches(&self, file_name: &str) -> bool {
    Path::new(file_name)
      .extension()
      .is_some_and(|ext| ext == self.extension.as_str())
  }

  fn load(&self, path: &Path, directory: &PathDescriptor) -> Result<Option<Arc<dyn Discoverable>>, LoadError> {
    let lua_err = |e: LuaError| LoadError::Lua {
      path: path.to_path_buf(),
      message: e.to_string(),
    };

    let lua = runtime::create_runtime(directory).map_err(lua_err)?;
    let LuaValue::Table(table) = loaders::load_file_with_dir(&lua, path).map_err(lua_err)? else {
      debug!(file = %path.display(), "definition does not return a table");
      return Ok(None);
    };

    let kind = match table.get::<LuaValue>("kind").map_err(lua_err)? {
      LuaValue::String(kind) => kind.to_string_lossy().to_string(),
      _ => {
        debug!(file = %path.display(), "definition has no kind");
        return Ok(None);
      }
    };
    if !self.kinds.contains(&kind) {
      debug!(file = %path.display(), kind = %kind, "unknown kind");
      return Ok(None);
    }

    let data: serde_json::Value = lua.from_value(LuaValue::Table(table)).map_err(|e| LoadError::Definition {
      path: path.to_path_buf(),
      message: e.to_string(),
    })?;

    self
      .kinds
      .construct(Definition {
        kind,
        file: path.to_path_buf(),
        directory: directory.clone(),
        data,
      })
      .transpose()
  }
}
