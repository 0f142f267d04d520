use std::{
    collections::BTreeMap,
    process,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use pressroom::{
    cache::{
        AutoRefreshScheduler, CacheConfig, CacheEntry, CacheInvalidator, HardReset,
        InvalidationPolicy, MemoryQueryCache, QueryKey,
    },
    config::{self, CheckArgs, Command, InvalidateArgs, RulesArgs, WatchArgs},
    error::AppError,
    telemetry,
};
use serde::Serialize;
use serde_json::json;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(Command::Watch(Box::<WatchArgs>::default()));

    telemetry::init(&settings.logging)?;
    let cache_config = CacheConfig::from(&settings.cache);

    match command {
        Command::Watch(args) => run_watch(cache_config, *args).await,
        Command::Invalidate(args) => run_invalidate(cache_config, args),
        Command::Rules(args) => run_rules(args),
        Command::Check(args) => run_check(cache_config, args),
    }
}

/// In-process cache session: a seeded memory cache wired to the rule table.
struct Session {
    cache: Arc<MemoryQueryCache>,
    invalidator: Arc<CacheInvalidator>,
    reloads: Arc<AtomicUsize>,
}

fn build_session(config: &CacheConfig) -> Result<Session, AppError> {
    InvalidationPolicy::validate_refetchable(&config.refetchable_keys)?;

    let cache = Arc::new(MemoryQueryCache::new());
    for key in &config.refetchable_keys {
        cache.store(key.clone(), json!({ "key": key.to_string() }));
    }

    let reloads = Arc::new(AtomicUsize::new(0));
    let reload_counter = reloads.clone();
    let reloader = move || {
        let count = reload_counter.fetch_add(1, Ordering::SeqCst) + 1;
        warn!(reloads = count, "Host reload requested");
    };

    let escalation = HardReset::new(
        cache.clone(),
        Arc::new(reloader),
        config.hard_reset_categories.clone(),
    );
    let invalidator = Arc::new(CacheInvalidator::new(cache.clone(), escalation));

    info!(
        entries = cache.len(),
        critical = ?config.hard_reset_categories,
        "Cache session ready"
    );

    Ok(Session {
        cache,
        invalidator,
        reloads,
    })
}

async fn run_watch(config: CacheConfig, args: WatchArgs) -> Result<(), AppError> {
    let session = build_session(&config)?;
    let scheduler = AutoRefreshScheduler::new(session.invalidator.clone());
    let mut handle = scheduler.start(&config.auto_refresh)?;

    match args.duration_seconds {
        Some(seconds) => {
            info!(seconds, "Watching for a fixed duration");
            tokio::time::sleep(Duration::from_secs(seconds)).await;
        }
        None => {
            info!("Watching until interrupted (Ctrl-C)");
            tokio::signal::ctrl_c().await?;
        }
    }

    handle.stop();

    let stale: Vec<String> = session
        .cache
        .stale_keys()
        .iter()
        .map(ToString::to_string)
        .collect();
    info!(
        cycles = handle.cycles(),
        stale = ?stale,
        valid = session.cache.valid_count(),
        "Watch finished"
    );
    Ok(())
}

#[derive(Serialize)]
struct SessionReport {
    entries: BTreeMap<String, CacheEntry>,
    valid: usize,
    reloads: usize,
}

fn run_invalidate(config: CacheConfig, args: InvalidateArgs) -> Result<(), AppError> {
    let session = build_session(&config)?;

    for category in args.categories {
        session.invalidator.mutation_completed(category);
    }

    let report = SessionReport {
        entries: session
            .cache
            .snapshot()
            .into_iter()
            .map(|(key, entry)| (key.to_string(), entry))
            .collect(),
        valid: session.cache.valid_count(),
        reloads: session.reloads.load(Ordering::SeqCst),
    };

    let rendered = serde_json::to_string_pretty(&report)
        .map_err(|err| AppError::unexpected(format!("failed to render report: {err}")))?;
    println!("{rendered}");
    Ok(())
}

fn run_rules(args: RulesArgs) -> Result<(), AppError> {
    if args.json {
        let table: BTreeMap<String, &[QueryKey]> = InvalidationPolicy::rules()
            .map(|(category, keys)| (category.to_string(), keys))
            .collect();
        let rendered = serde_json::to_string_pretty(&table)
            .map_err(|err| AppError::unexpected(format!("failed to render rules: {err}")))?;
        println!("{rendered}");
        return Ok(());
    }

    for (category, keys) in InvalidationPolicy::rules() {
        let keys: Vec<String> = keys.iter().map(ToString::to_string).collect();
        println!("{category:<16} {}", keys.join(", "));
    }
    Ok(())
}

fn run_check(config: CacheConfig, _args: CheckArgs) -> Result<(), AppError> {
    InvalidationPolicy::validate_refetchable(&config.refetchable_keys)?;
    config.auto_refresh.validate()?;
    println!(
        "ok: {} rules, {} refetchable keys",
        InvalidationPolicy::rules().count(),
        config.refetchable_keys.len()
    );
    Ok(())
}
