use std::env;
use std::str::FromStr;
use std::time::Duration;

use dotenv::dotenv;
use log::warn;

use crate::domain::heuristic::HeuristicConfig;
use crate::domain::solver_factory::{SolveOptions, SolverType, StrategyKind};

const DEFAULT_PORT: u16 = 9000;
const DEFAULT_JSON_LIMIT: usize = 2 * 1024 * 1024; // 2 MB
const DEFAULT_TIME_LIMIT_SECS: u64 = 300;
const DEFAULT_STALL_SECS: u64 = 30;
const DEFAULT_PRUNE_ABOVE: usize = 110;
const DEFAULT_PLAN_CACHE_SIZE: usize = 64;

/// Process configuration read from the environment (and `.env`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    pub json_limit: usize,
    pub strategy: StrategyKind,
    pub backend: SolverType,
    pub time_limit: Duration,
    pub stall_window: Duration,
    /// `None` disables pruning
    pub prune_above: Option<usize>,
    pub plan_cache_size: usize,
    pub sentry_dsn: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            port: DEFAULT_PORT,
            json_limit: DEFAULT_JSON_LIMIT,
            strategy: StrategyKind::Exact,
            backend: SolverType::Glpk,
            time_limit: Duration::from_secs(DEFAULT_TIME_LIMIT_SECS),
            stall_window: Duration::from_secs(DEFAULT_STALL_SECS),
            prune_above: Some(DEFAULT_PRUNE_ABOVE),
            plan_cache_size: DEFAULT_PLAN_CACHE_SIZE,
            sentry_dsn: None,
        }
    }
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment
    pub fn from_env() -> Self {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup. Unparseable values keep their default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AppConfig::default();

        let strategy = match lookup("SOURCING_STRATEGY") {
            Some(raw) => StrategyKind::from_str(&raw).unwrap_or_else(|| {
                warn!("Unknown SOURCING_STRATEGY '{}', using exact", raw);
                defaults.strategy
            }),
            None => defaults.strategy,
        };
        let backend = match lookup("SOURCING_BACKEND") {
            Some(raw) => SolverType::from_str(&raw).unwrap_or_else(|| {
                warn!("Unknown or unavailable SOURCING_BACKEND '{}', using glpk", raw);
                defaults.backend
            }),
            None => defaults.backend,
        };

        let prune_above = match parsed::<usize, _>(&lookup, "SOURCING_PRUNE_ABOVE") {
            Some(0) => None,
            Some(limit) => Some(limit),
            None => defaults.prune_above,
        };

        AppConfig {
            port: parsed(&lookup, "PORT").unwrap_or(defaults.port),
            json_limit: parsed(&lookup, "JSON_PAYLOAD_LIMIT").unwrap_or(defaults.json_limit),
            strategy,
            backend,
            time_limit: parsed(&lookup, "SOURCING_TIME_LIMIT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.time_limit),
            stall_window: parsed(&lookup, "SOURCING_STALL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.stall_window),
            prune_above,
            plan_cache_size: parsed(&lookup, "PLAN_CACHE_SIZE").unwrap_or(defaults.plan_cache_size),
            sentry_dsn: lookup("SENTRY_DSN").filter(|dsn| !dsn.trim().is_empty()),
        }
    }

    pub fn solve_options(&self) -> SolveOptions {
        SolveOptions {
            strategy: self.strategy,
            backend: self.backend,
            time_limit: self.time_limit,
            heuristic: HeuristicConfig {
                stall_window: self.stall_window,
                prune_above: self.prune_above,
                ..HeuristicConfig::default()
            },
        }
    }
}

fn parsed<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring unparseable {}='{}'", key, raw);
            None
        }
    }
}
