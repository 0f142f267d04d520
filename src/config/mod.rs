//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::str::FromStr;

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::{InvalidationPolicy, MutationCategory, QueryKey};

mod cli;

pub use cli::{
    CheckArgs, CliArgs, Command, InvalidateArgs, RulesArgs, SessionOverrides, WatchArgs,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "pressroom";
const ENV_PREFIX: &str = "PRESSROOM";
const DEFAULT_AUTO_REFRESH_INTERVAL_MS: u64 = crate::cache::DEFAULT_AUTO_REFRESH_INTERVAL_MS;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub auto_refresh_interval_ms: u64,
    pub auto_refresh_enabled: bool,
    pub auto_refresh_keys: Vec<QueryKey>,
    pub hard_reset_categories: Vec<MutationCategory>,
    pub refetchable_keys: Vec<QueryKey>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(environment());

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Watch(args)) => raw.apply_session_overrides(&args.overrides),
        Some(Command::Invalidate(args)) => raw.apply_session_overrides(&args.overrides),
        Some(Command::Check(args)) => raw.apply_session_overrides(&args.overrides),
        Some(Command::Rules(_)) | None => {}
    }

    Settings::from_raw(raw)
}

/// `PRESSROOM__SECTION__KEY` variables; list keys split on commas.
fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("cache.auto_refresh_keys")
        .with_list_parse_key("cache.hard_reset_categories")
        .with_list_parse_key("cache.refetchable_keys")
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
}

impl RawSettings {
    fn apply_session_overrides(&mut self, overrides: &SessionOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(interval) = overrides.cache_auto_refresh_interval_ms {
            self.cache.auto_refresh_interval_ms = Some(interval);
        }
        if let Some(enabled) = overrides.cache_auto_refresh_enabled {
            self.cache.auto_refresh_enabled = Some(enabled);
        }
        if let Some(keys) = overrides.cache_auto_refresh_keys.as_ref() {
            self.cache.auto_refresh_keys = Some(keys.clone());
        }
        if let Some(categories) = overrides.cache_hard_reset_categories.as_ref() {
            self.cache.hard_reset_categories = Some(categories.clone());
        }
        if let Some(keys) = overrides.cache_refetchable_keys.as_ref() {
            self.cache.refetchable_keys = Some(keys.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings { logging, cache } = raw;

        let logging = build_logging_settings(logging)?;
        let cache = build_cache_settings(cache)?;

        Ok(Self { logging, cache })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let interval_ms = cache
        .auto_refresh_interval_ms
        .unwrap_or(DEFAULT_AUTO_REFRESH_INTERVAL_MS);
    if interval_ms == 0 {
        return Err(LoadError::invalid(
            "cache.auto_refresh_interval_ms",
            "must be greater than zero",
        ));
    }

    let auto_refresh_keys = match cache.auto_refresh_keys {
        Some(keys) => parse_keys(&keys, "cache.auto_refresh_keys")?,
        None => crate::cache::DEFAULT_AUTO_REFRESH_KEYS
            .iter()
            .map(|name| QueryKey::root(*name))
            .collect(),
    };

    let hard_reset_categories = match cache.hard_reset_categories {
        Some(names) => names
            .iter()
            .map(|name| {
                name.parse::<MutationCategory>().map_err(|err| {
                    LoadError::invalid("cache.hard_reset_categories", err.to_string())
                })
            })
            .collect::<Result<Vec<_>, _>>()?,
        None => vec![MutationCategory::FullReset],
    };

    let refetchable_keys = match cache.refetchable_keys {
        Some(keys) => parse_keys(&keys, "cache.refetchable_keys")?,
        None => InvalidationPolicy::known_keys().to_vec(),
    };

    Ok(CacheSettings {
        auto_refresh_interval_ms: interval_ms,
        auto_refresh_enabled: cache.auto_refresh_enabled.unwrap_or(true),
        auto_refresh_keys,
        hard_reset_categories,
        refetchable_keys,
    })
}

fn parse_keys(raw: &[String], key: &'static str) -> Result<Vec<QueryKey>, LoadError> {
    raw.iter()
        .enumerate()
        .map(|(index, value)| {
            if value.trim().is_empty() {
                return Err(LoadError::invalid(key, format!("entry {index} is blank")));
            }
            QueryKey::parse(value).map_err(|err| LoadError::invalid(key, err.to_string()))
        })
        .collect()
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    auto_refresh_interval_ms: Option<u64>,
    auto_refresh_enabled: Option<bool>,
    auto_refresh_keys: Option<Vec<String>>,
    hard_reset_categories: Option<Vec<String>>,
    refetchable_keys: Option<Vec<String>>,
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
