use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CasebookConfig {
    pub api_port: u16,
    pub paths: CasebookPaths,
    pub trending: TrendingConfig,
}

impl CasebookConfig {
    pub fn from_env() -> Result<Self> {
        let paths = match env::var("CASEBOOK_HOME") {
            Ok(raw) if !raw.trim().is_empty() => CasebookPaths::from_base_dir(raw.trim())?,
            _ => CasebookPaths::discover()?,
        };
        let api_port = env::var("CASEBOOK_API_PORT")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(8080);
        Ok(Self {
            api_port,
            paths,
            trending: TrendingConfig::from_env(),
        })
    }

    pub fn new(api_port: u16, paths: CasebookPaths) -> Self {
        Self {
            api_port,
            paths,
            trending: TrendingConfig::default(),
        }
    }
}

/// Tuning for the trending cache and the query behind it.
#[derive(Debug, Clone)]
pub struct TrendingConfig {
    /// How long a computed result set is served before re-querying.
    pub ttl: Duration,
    /// Rolling window of interactions considered by the query.
    pub window: chrono::Duration,
    /// Number of ranked cases fetched and cached per computation.
    pub capacity: usize,
}

impl Default for TrendingConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5 * 60),
            window: chrono::Duration::days(7),
            capacity: 50,
        }
    }
}

impl TrendingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let ttl = env::var("CASEBOOK_TRENDING_TTL_SECS")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.ttl);
        let window = env::var("CASEBOOK_TRENDING_WINDOW_DAYS")
            .ok()
            .and_then(|raw| raw.parse::<i64>().ok())
            .filter(|days| *days > 0)
            .map(chrono::Duration::days)
            .unwrap_or(defaults.window);
        let capacity = env::var("CASEBOOK_TRENDING_CAPACITY")
            .ok()
            .and_then(|raw| raw.parse::<usize>().ok())
            .filter(|capacity| *capacity > 0)
            .unwrap_or(defaults.capacity);
        Self {
            ttl,
            window,
            capacity,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CasebookPaths {
    pub base: PathBuf,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub logs_dir: PathBuf,
}

impl CasebookPaths {
    pub fn discover() -> Result<Self> {
        let exe_path = std::env::current_exe()
            .map_err(|err| anyhow!("failed to resolve current executable: {err}"))?;
        let base = exe_path
            .parent()
            .ok_or_else(|| anyhow!("executable path missing parent"))?
            .to_path_buf();
        Self::from_base_dir(base)
    }

    pub fn from_base_dir<P: AsRef<Path>>(base: P) -> Result<Self> {
        let base = base.as_ref().to_path_buf();
        let data_dir = base.join("data");
        let db_path = data_dir.join("casebook.db");
        let logs_dir = base.join("logs");

        Ok(Self {
            base,
            data_dir,
            db_path,
            logs_dir,
        })
    }
}
