//! The built-in `resource` kind.
//!
//! A resource is the generic artifact: an id, the scope it was built for, the
//! directory it was defined in, an optional route, free-form props and the
//! resources it depends on. Resources find each other through a shared
//! [`Catalog`], and a resource's initializer awaits the construct handles of
//! its dependencies before it resolves.
//!
//! ```lua
//! return {
//!   kind = "resource",
//!   id = "users",
//!   depends_on = { "database" },
//!   route_base = "/srv/api",
//!   props = { replicas = 2 },
//! }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::consts::{PROPS_KEY, ROUTE_BASE_KEY};
use crate::descriptor::PathDescriptor;
use crate::discover::{Discoverable, LoadError};
use crate::factory::{ArtifactFactory, BoxError, ConstructHandle, Initialize};
use crate::kinds::Definition;
use crate::scope::{Configuration, Scope};
use crate::util::hash::derive_id;

#[derive(Debug, Error)]
pub enum ResourceError {
  #[error("resource '{id}' depends on unknown resource '{dependency}'")]
  UnknownDependency { id: String, dependency: String },
}

/// A resolved resource.
#[derive(Debug, Clone, Serialize)]
pub struct Resource {
  pub id: String,
  pub scope: String,
  pub directory: PathBuf,
  pub route: Option<String>,
  pub props: Map<String, Value>,
  pub depends_on: Vec<String>,
  #[serde(skip)]
  pub dependencies: Vec<Arc<Resource>>,
}

impl Resource {
  /// A resolved dependency by id.
  pub fn dependency(&self, id: &str) -> Option<&Arc<Resource>> {
    self.dependencies.iter().find(|dep| dep.id == id)
  }
}

/// The fields a resource definition may set.
#[derive(Debug, Deserialize)]
struct ResourceDefinition {
  #[serde(default)]
  id: Option<String>,
  #[serde(default, deserialize_with = "string_list")]
  depends_on: Vec<String>,
  #[serde(default)]
  route_base: Option<String>,
  #[serde(default, deserialize_with = "table")]
  props: Map<String, Value>,
}

// Lua cannot tell an empty list from an empty table, so both shapes are accepted.
fn string_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
  match Value::deserialize(deserializer)? {
    Value::Null => Ok(Vec::new()),
    Value::Object(map) if map.is_empty() => Ok(Vec::new()),
    Value::String(single) => Ok(vec![single]),
    other => serde_json::from_value(other).map_err(serde::de::Error::custom),
  }
}

fn table<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Map<String, Value>, D::Error> {
  match Value::deserialize(deserializer)? {
    Value::Null => Ok(Map::new()),
    Value::Array(list) if list.is_empty() => Ok(Map::new()),
    Value::Object(map) => Ok(map),
    other => Err(serde::de::Error::custom(format!("expected a table, found {}", other))),
  }
}

/// Initializer of the `resource` kind.
#[derive(Debug)]
pub struct ResourceInitializer {
  depends_on: Vec<String>,
  route_base: Option<String>,
  props: Map<String, Value>,
  catalog: Catalog,
}

#[async_trait]
impl Initialize for ResourceInitializer {
  type Artifact = Resource;

  fn dependencies(&self) -> Vec<String> {
    self.depends_on.clone()
  }

  async fn initialize(
    &self,
    scope: &Scope,
    id: &str,
    directory: &PathDescriptor,
    config: Configuration,
  ) -> Result<Resource, BoxError> {
    let mut dependencies = Vec::with_capacity(self.depends_on.len());
    for dependency in &self.depends_on {
      let handle = self
        .catalog
        .construct(dependency, scope)
        .ok_or_else(|| ResourceError::UnknownDependency {
          id: id.to_string(),
          dependency: dependency.clone(),
        })?;
      debug!(artifact = %id, dependency = %dependency, scope = %scope, "awaiting dependency");
      dependencies.push(handle.await?);
    }

    let route_base = self
      .route_base
      .clone()
      .or_else(|| config.get(ROUTE_BASE_KEY).and_then(Value::as_str).map(str::to_string));
    let route = route_base
      .map(|base| directory.route_relative_to(base))
      .transpose()?;

    let mut props = match config.get(PROPS_KEY) {
      Some(Value::Object(defaults)) => defaults.clone(),
      _ => Map::new(),
    };
    props.extend(self.props.clone());

    Ok(Resource {
      id: id.to_string(),
      scope: scope.name().to_string(),
      directory: directory.absolute_path().to_path_buf(),
      route,
      props,
      depends_on: self.depends_on.clone(),
      dependencies,
    })
  }
}

pub type ResourceFactory = ArtifactFactory<ResourceInitializer>;

#[derive(Debug)]
struct CatalogEntry {
  factory: Arc<ResourceFactory>,
  file: PathBuf,
}

/// Registry of resource factories by id, shared by all resources of a tree.
///
/// Cloning is cheap; clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
  entries: Arc<RwLock<HashMap<String, CatalogEntry>>>,
}

impl Catalog {
  /// Register `factory`, defined in `file`.
  ///
  /// Re-registering an id from the same file replaces the entry, so a tree
  /// can be discovered again. The same id from another file is an error.
  pub fn insert(&self, file: &Path, factory: Arc<ResourceFactory>) -> Result<(), LoadError> {
    let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
    if let Some(existing) = entries.get(factory.id()).filter(|existing| existing.file != file) {
      return Err(LoadError::DuplicateId {
        id: factory.id().to_string(),
        path: file.to_path_buf(),
        first: existing.file.clone(),
      });
    }
    entries.insert(
      factory.id().to_string(),
      CatalogEntry {
        factory,
        file: file.to_path_buf(),
      },
    );
    Ok(())
  }

  pub fn get(&self, id: &str) -> Option<Arc<ResourceFactory>> {
    let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
    entries.get(id).map(|entry| Arc::clone(&entry.factory))
  }

  /// Handle to the resource `id` for `scope`, if `id` is registered.
  pub fn construct(&self, id: &str, scope: &Scope) -> Option<ConstructHandle<Resource>> {
    self.get(id).map(|factory| factory.get_construct(scope))
  }

  /// Registered ids, sorted.
  pub fn ids(&self) -> Vec<String> {
    let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
    let mut ids: Vec<String> = entries.keys().cloned().collect();
    ids.sort();
    ids
  }

  pub fn len(&self) -> usize {
    self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// Turn a `resource` definition into a factory and register it in `catalog`.
pub fn construct(catalog: &Catalog, definition: Definition) -> Result<Arc<dyn Discoverable>, LoadError> {
  let parsed: ResourceDefinition = serde_json::from_value(definition.data).map_err(|e| LoadError::Definition {
    path: definition.file.clone(),
    message: e.to_string(),
  })?;

  let id = parsed.id.unwrap_or_else(|| derive_id(&definition.file));
  let initializer = ResourceInitializer {
    depends_on: parsed.depends_on,
    route_base: parsed.route_base,
    props: parsed.props,
    catalog: catalog.clone(),
  };
  let factory = Arc::new(ArtifactFactory::new(id, initializer)?);
  catalog.insert(&definition.file, Arc::clone(&factory))?;
  Ok(factory)
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::factory::FactoryError;
  use crate::kinds::RESOURCE_KIND;

  fn definition(file: &str, data: Value) -> Definition {
    Definition {
      kind: RESOURCE_KIND.to_string(),
      file: PathBuf::from(file),
      directory: PathDescriptor::new("defs").unwrap(),
      data,
    }
  }

  fn dev() -> Scope {
    Scope::new("dev").unwrap()
  }

  mod construction {
    use super::*;

    #[test]
    fn registers_under_declared_id() {
      let catalog = Catalog::default();
      let factory = construct(&catalog, definition("defs/users.lua", json!({ "id": "users" }))).unwrap();
      assert_eq!(factory.id(), "users");
      assert_eq!(catalog.ids(), vec!["users"]);
    }

    #[test]
    fn missing_id_is_derived_from_file() {
      let catalog = Catalog::default();
      let factory = construct(&catalog, definition("/defs/users.lua", json!({}))).unwrap();
      assert_eq!(factory.id(), derive_id(Path::new("/defs/users.lua")));
    }

    #[test]
    fn declared_dependencies_are_exposed() {
      let catalog = Catalog::default();
      let factory = construct(
        &catalog,
        definition("a.lua", json!({ "id": "a", "depends_on": ["b", "c"] })),
      )
      .unwrap();
      assert_eq!(factory.dependencies(), vec!["b", "c"]);
    }

    #[test]
    fn empty_tables_are_accepted_for_lists_and_props() {
      let catalog = Catalog::default();
      let factory = construct(
        &catalog,
        definition("a.lua", json!({ "id": "a", "depends_on": {}, "props": [] })),
      )
      .unwrap();
      assert!(factory.dependencies().is_empty());
    }

    #[test]
    fn duplicate_id_from_another_file_fails() {
      let catalog = Catalog::default();
      construct(&catalog, definition("a.lua", json!({ "id": "same" }))).unwrap();
      let err = construct(&catalog, definition("b.lua", json!({ "id": "same" }))).unwrap_err();
      assert!(matches!(err, LoadError::DuplicateId { ref id, .. } if id == "same"));
    }

    #[test]
    fn reloading_the_same_file_replaces_entry() {
      let catalog = Catalog::default();
      construct(&catalog, definition("a.lua", json!({ "id": "same" }))).unwrap();
      construct(&catalog, definition("a.lua", json!({ "id": "same" }))).unwrap();
      assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn malformed_fields_fail_to_load() {
      let catalog = Catalog::default();
      let err = construct(&catalog, definition("a.lua", json!({ "props": 5 }))).unwrap_err();
      assert!(matches!(err, LoadError::Definition { .. }));
      assert!(catalog.is_empty());
    }
  }

  mod initialization {
    use super::*;

    fn resource_factory(catalog: &Catalog, id: &str, data: Value) -> Arc<ResourceFactory> {
      construct(catalog, definition(&format!("{}.lua", id), data)).unwrap();
      catalog.get(id).unwrap()
    }

    #[tokio::test]
    async fn awaits_dependencies_initialized_later() {
      let catalog = Catalog::default();
      let api = resource_factory(&catalog, "api", json!({ "id": "api", "depends_on": ["db"] }));
      let db = resource_factory(&catalog, "db", json!({ "id": "db", "props": { "engine": "pg" } }));
      let dir = PathDescriptor::new("defs").unwrap();
      let config = Configuration::new();
      let scope = dev();

      let (api_res, db_res) = tokio::join!(api.init(&scope, &dir, &config), db.init(&scope, &dir, &config));
      let api_res = api_res.unwrap();
      let db_res = db_res.unwrap();

      let dep = api_res.dependency("db").unwrap();
      assert!(Arc::ptr_eq(dep, &db_res));
      assert_eq!(dep.props["engine"], json!("pg"));
      assert_eq!(api_res.scope, "dev");
    }

    #[tokio::test]
    async fn unknown_dependency_fails_dependent() {
      let catalog = Catalog::default();
      let api = resource_factory(&catalog, "api", json!({ "id": "api", "depends_on": ["ghost"] }));
      let dir = PathDescriptor::new("defs").unwrap();

      let err = api.init(&dev(), &dir, &Configuration::new()).await.unwrap_err();
      assert!(matches!(err, FactoryError::Initialization { ref id, .. } if id == "api"));
      assert!(err.to_string().contains("ghost"));
    }

    #[tokio::test]
    async fn dependency_failure_is_reported_verbatim() {
      let catalog = Catalog::default();
      let api = resource_factory(&catalog, "api", json!({ "id": "api", "depends_on": ["db"] }));
      let db = resource_factory(&catalog, "db", json!({ "id": "db", "depends_on": ["ghost"] }));
      let dir = PathDescriptor::new("defs").unwrap();
      let config = Configuration::new();
      let scope = dev();

      let (api_res, _) = tokio::join!(api.init(&scope, &dir, &config), db.init(&scope, &dir, &config));
      assert_eq!(api_res.unwrap_err().artifact_id(), Some("db"));
    }

    #[tokio::test]
    async fn config_props_are_defaults() {
      let catalog = Catalog::default();
      let api = resource_factory(
        &catalog,
        "api",
        json!({ "id": "api", "props": { "replicas": 3 } }),
      );
      let dir = PathDescriptor::new("defs").unwrap();
      let mut config = Configuration::new();
      config.insert(PROPS_KEY.to_string(), json!({ "replicas": 1, "region": "eu" }));

      let res = api.init(&dev(), &dir, &config).await.unwrap();
      assert_eq!(res.props["replicas"], json!(3));
      assert_eq!(res.props["region"], json!("eu"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn route_comes_from_definition_then_config() {
      let catalog = Catalog::default();
      let own = resource_factory(&catalog, "own", json!({ "id": "own", "route_base": "/srv" }));
      let shared = resource_factory(&catalog, "shared", json!({ "id": "shared" }));
      let bare = resource_factory(&catalog, "bare", json!({ "id": "bare" }));
      let dir = PathDescriptor::new("/srv/api/users").unwrap();
      let mut config = Configuration::new();
      config.insert(ROUTE_BASE_KEY.to_string(), json!("/srv/api"));

      let own = own.init(&dev(), &dir, &config).await.unwrap();
      let shared = shared.init(&dev(), &dir, &config).await.unwrap();
      let bare = bare.init(&dev(), &dir, &Configuration::new()).await.unwrap();

      assert_eq!(own.route.as_deref(), Some("/api/users"));
      assert_eq!(shared.route.as_deref(), Some("/users"));
      assert_eq!(bare.route, None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unrelated_route_base_fails() {
      let catalog = Catalog::default();
      let api = resource_factory(&catalog, "api", json!({ "id": "api", "route_base": "/elsewhere" }));
      let dir = PathDescriptor::new("/srv/api").unwrap();

      let err = api.init(&dev(), &dir, &Configuration::new()).await.unwrap_err();
      assert!(matches!(err, FactoryError::Initialization { .. }));
    }
  }
}
