//! arbor-lib: artifact discovery and lazy per-scope resolution.
//!
//! Artifact definitions live as files in a directory tree. The library walks
//! the tree, turns every definition into an [`ArtifactFactory`], and builds
//! all of them for a [`Scope`] concurrently:
//! - `PathDescriptor`: immutable directory descriptor with route computation
//! - `ArtifactFactory`: memoized, awaitable per-scope initialization
//! - `Builder`: discovery walk and concurrent build of a tree
//! - `LuaLoader`: Lua definition files and their kinds
//!
//! [`ArtifactFactory`]: factory::ArtifactFactory
//! [`Scope`]: scope::Scope

pub mod builder;
pub mod consts;
pub mod descriptor;
pub mod discover;
pub mod factory;
pub mod kinds;
pub mod lua;
pub mod resource;
pub mod scope;
pub mod util;
