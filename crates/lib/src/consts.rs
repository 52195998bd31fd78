/// Application name, used for environment variable prefixes and the Lua global.
pub const APP_NAME: &str = "arbor";

/// File extension of Lua artifact definitions.
pub const LUA_DEFINITION_EXT: &str = "lua";

/// Length of the hex digest used in derived artifact ids.
pub const ID_HASH_PREFIX_LEN: usize = 20;

/// Configuration key consulted for the route base of a resource.
pub const ROUTE_BASE_KEY: &str = "route_base";

/// Environment variable overriding the build timeout, in seconds.
pub const BUILD_TIMEOUT_ENV: &str = "ARBOR_BUILD_TIMEOUT";

/// Environment variable disabling the declared-dependency cycle check.
pub const SKIP_CYCLE_CHECK_ENV: &str = "ARBOR_SKIP_CYCLE_CHECK";

/// Configuration key holding default props merged into every resource.
pub const PROPS_KEY: &str = "props";
