use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

#[derive(Debug, Parser)]
#[command(name = "realworld", version, about = "RealWorld blog API server")]
pub struct CliArgs {
    /// Extra configuration file layered above `config/default` and `realworld.*`.
    #[arg(long, env = "REALWORLD_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    /// Defaults to `serve`.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Serve the JSON API until SIGINT or SIGTERM.
    Serve(Box<ServeArgs>),
    /// Apply pending migrations and exit.
    Migrate(MigrateArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Clone, Default, Args)]
pub struct MigrateArgs {
    #[arg(long, value_name = "URL")]
    pub database_url: Option<String>,
}

/// Flags layered over file and environment configuration; unset flags leave it alone.
#[derive(Debug, Clone, Default, Args)]
pub struct ServeOverrides {
    #[arg(long, value_name = "HOST")]
    pub server_host: Option<String>,
    #[arg(long, value_name = "PORT")]
    pub server_port: Option<u16>,
    /// Per-request deadline.
    #[arg(long, value_name = "SECONDS")]
    pub server_timeout: Option<u64>,

    /// trace, debug, info, warn or error.
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
    #[arg(long, value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub log_json: Option<bool>,

    #[arg(long, value_name = "URL")]
    pub database_url: Option<String>,
    #[arg(long, value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub database_migrate: Option<bool>,

    #[arg(long, value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub cache_enabled: Option<bool>,
    /// redis or memory.
    #[arg(long, value_name = "KIND")]
    pub cache_kind: Option<String>,
}
