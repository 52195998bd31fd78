mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cmd::{BuildArgs, cmd_build, cmd_discover, cmd_route, parse_key_value, parse_label};
use crate::output::print_error;

/// arbor - discover and build artifact definition trees
#[derive(Parser)]
#[command(name = "arbor")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// List the artifact definitions found below a directory
  Discover {
    /// Root of the definition tree
    #[arg(default_value = ".")]
    root: PathBuf,

    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Build every artifact definition below a directory for one scope
  Build {
    /// Root of the definition tree
    #[arg(default_value = ".")]
    root: PathBuf,

    /// Scope (target environment) to build for
    #[arg(short, long)]
    scope: String,

    /// Descriptive label attached to the scope
    #[arg(long = "label", value_name = "KEY=VALUE", value_parser = parse_label)]
    labels: Vec<(String, String)>,

    /// Configuration entry passed to every artifact; VALUE is parsed as JSON when possible
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    set: Vec<(String, serde_json::Value)>,

    /// Fail if the build takes longer than this (e.g. 30s, 2m)
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Skip the declared dependency cycle check
    #[arg(long)]
    skip_cycle_check: bool,

    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Print the route of a directory relative to a base directory
  Route {
    /// Directory to compute the route for
    path: PathBuf,

    /// Base directory the route is relative to
    #[arg(short, long)]
    base: PathBuf,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result = match cli.command {
    Commands::Discover { root, json } => cmd_discover(&root, json),
    Commands::Build {
      root,
      scope,
      labels,
      set,
      timeout,
      skip_cycle_check,
      json,
    } => cmd_build(BuildArgs {
      root,
      scope,
      labels,
      set,
      timeout,
      skip_cycle_check,
      json,
    }),
    Commands::Route { path, base } => cmd_route(&path, &base),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      print_error(&format!("{:#}", err));
      ExitCode::FAILURE
    }
  }
}
