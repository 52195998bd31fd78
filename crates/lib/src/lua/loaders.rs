//! Definition file loading with per-file `__dir` injection.
//!
//! Each definition chunk runs in its own environment table holding `__dir`,
//! the canonical directory of the file. Globals are reached through the
//! environment's metatable, so writes to undeclared names still land in `_G`.

use std::fs;
use std::path::Path;

use mlua::prelude::*;

/// Load and evaluate a Lua file with `__dir` set in its environment.
///
/// Returns whatever the chunk returns.
pub fn load_file_with_dir(lua: &Lua, path: &Path) -> LuaResult<LuaValue> {
  let canonical_path = dunce::canonicalize(path)
    .map_err(|e| LuaError::external(format!("cannot resolve '{}': {}", path.display(), e)))?;

  let content = fs::read_to_string(&canonical_path)
    .map_err(|e| LuaError::external(format!("cannot read '{}': {}", canonical_path.display(), e)))?;

  let dir = canonical_path
    .parent()
    .unwrap_or(Path::new("."))
    .to_string_lossy()
    .into_owned();

  let env = lua.create_table()?;
  env.set("__dir", dir)?;

  let mt = lua.create_table()?;
  mt.set("__index", lua.globals())?;
  mt.set("__newindex", lua.globals())?;
  env.set_metatable(Some(mt))?;

  lua
    .load(&content)
    .set_name(format!("@{}", canonical_path.display()))
    .set_environment(env)
    .eval::<LuaValue>()
}
