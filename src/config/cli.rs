use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

use crate::cache::MutationCategory;

/// Command-line arguments for the Pressroom binary.
#[derive(Debug, Parser)]
#[command(
    name = "pressroom",
    version,
    about = "Pressroom cache consistency tools"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "PRESSROOM_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a cache session with auto refresh until interrupted.
    Watch(Box<WatchArgs>),
    /// Report completed mutations against a seeded cache and print the result.
    Invalidate(InvalidateArgs),
    /// Print the invalidation rule table.
    Rules(RulesArgs),
    /// Check that every rule key is covered by a refetchable key.
    Check(CheckArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct WatchArgs {
    #[command(flatten)]
    pub overrides: SessionOverrides,

    /// Stop after this many seconds instead of waiting for Ctrl-C.
    #[arg(long = "duration-seconds", value_name = "SECONDS")]
    pub duration_seconds: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct InvalidateArgs {
    #[command(flatten)]
    pub overrides: SessionOverrides,

    /// Mutation categories to report, in order.
    #[arg(value_name = "CATEGORY", required = true)]
    pub categories: Vec<MutationCategory>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RulesArgs {
    /// Print the table as JSON.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub json: bool,
}

#[derive(Debug, Args, Default, Clone)]
pub struct CheckArgs {
    #[command(flatten)]
    pub overrides: SessionOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct SessionOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Emit logs as JSON.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the auto-refresh interval in milliseconds.
    #[arg(long = "cache-auto-refresh-interval-ms", value_name = "MS")]
    pub cache_auto_refresh_interval_ms: Option<u64>,

    /// Enable or disable auto refresh.
    #[arg(
        long = "cache-auto-refresh-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_auto_refresh_enabled: Option<bool>,

    /// Keys invalidated on every auto-refresh cycle (comma separated, `/` between segments).
    #[arg(
        long = "cache-auto-refresh-keys",
        value_name = "KEYS",
        value_delimiter = ','
    )]
    pub cache_auto_refresh_keys: Option<Vec<String>>,

    /// Mutation categories that escalate to a hard reset (comma separated).
    #[arg(
        long = "cache-hard-reset-categories",
        value_name = "CATEGORIES",
        value_delimiter = ','
    )]
    pub cache_hard_reset_categories: Option<Vec<String>>,

    /// Keys the UI can refetch (comma separated).
    #[arg(
        long = "cache-refetchable-keys",
        value_name = "KEYS",
        value_delimiter = ','
    )]
    pub cache_refetchable_keys: Option<Vec<String>>,
}
