use mlua::prelude::*;

use crate::consts::APP_NAME;
use crate::descriptor::PathDescriptor;

/// Create a fresh Lua state for evaluating definitions found in `directory`.
///
/// Registers the `arbor` global:
/// - `arbor.dir` - the directory's `name`, `path`, `absolute_path` and `parent_path`
/// - `arbor.route(base)` - the directory's route relative to `base`
/// - `arbor.version` - the library version
///
/// The directory is prepended to `package.path`, so definitions can
/// `require` helper modules that sit next to them.
pub fn create_runtime(directory: &PathDescriptor) -> LuaResult<Lua> {
  let lua = Lua::new();

  let package = lua.globals().get::<LuaTable>("package")?;
  let package_path = package.get::<String>("path")?;
  let dir_pattern = directory.absolute_path().join("?.lua");
  package.set("path", format!("{};{}", dir_pattern.to_string_lossy(), package_path))?;

  let dir = lua.create_table()?;
  dir.set("name", directory.name())?;
  dir.set("path", directory.path().to_string_lossy().into_owned())?;
  dir.set("absolute_path", directory.absolute_path().to_string_lossy().into_owned())?;
  dir.set("parent_path", directory.parent_path().to_string_lossy().into_owned())?;

  let descriptor = directory.clone();
  let route = lua.create_function(move |_, base: String| {
    descriptor.route_relative_to(&base).map_err(LuaError::external)
  })?;

  let globals = lua.create_table()?;
  globals.set("dir", dir)?;
  globals.set("route", route)?;
  globals.set("version", env!("CARGO_PKG_VERSION"))?;
  lua.globals().set(APP_NAME, globals)?;

  Ok(lua)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn exposes_directory() -> LuaResult<()> {
    let dir = PathDescriptor::new("defs/api").unwrap();
    let lua = create_runtime(&dir)?;

    let name: String = lua.load("return arbor.dir.name").eval()?;
    let absolute: String = lua.load("return arbor.dir.absolute_path").eval()?;
    assert_eq!(name, "api");
    assert_eq!(absolute, dir.absolute_path().to_string_lossy());
    Ok(())
  }

  #[cfg(unix)]
  #[test]
  fn route_uses_descriptor() -> LuaResult<()> {
    let dir = PathDescriptor::new("/srv/defs/api/users").unwrap();
    let lua = create_runtime(&dir)?;

    let route: String = lua.load("return arbor.route('/srv/defs')").eval()?;
    assert_eq!(route, "/api/users");
    Ok(())
  }

  #[cfg(unix)]
  #[test]
  fn route_errors_surface_in_lua() -> LuaResult<()> {
    let dir = PathDescriptor::new("/srv/defs").unwrap();
    let lua = create_runtime(&dir)?;

    let (ok, message): (bool, String) = lua
      .load("local ok, err = pcall(arbor.route, '/elsewhere') return ok, tostring(err)")
      .eval()?;
    assert!(!ok);
    assert!(message.contains("does not exist"));
    Ok(())
  }
}
