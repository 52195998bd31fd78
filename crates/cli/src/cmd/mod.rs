mod build;
mod discover;
mod route;

pub use build::{BuildArgs, cmd_build, parse_key_value, parse_label};
pub use discover::cmd_discover;
pub use route::cmd_route;
