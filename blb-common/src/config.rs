//! Configuration loading for BetterLB services
//!
//! Settings are resolved in priority order:
//! 1. Command-line arguments (highest priority)
//! 2. Environment variables (`BLB_*`)
//! 3. TOML config file
//! 4. OS-dependent compiled defaults (fallback)
//!
//! A missing or unreadable TOML file is not an error: a warning is logged and
//! the remaining tiers are used.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default bind address for the admin service
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5740";

/// Default cap on near-duplicate pairs emitted per scan
pub const DEFAULT_NEAR_DUPLICATE_LIMIT: i64 = 50;

/// Default page size for conflict listings
pub const DEFAULT_CONFLICT_PAGE_SIZE: i64 = 20;

/// Bootstrap configuration as written in `admin.toml`
///
/// Every field is optional; absent fields fall through to the next tier.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Path to the SQLite database file
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Socket address the HTTP server binds to
    #[serde(default)]
    pub bind_address: Option<String>,

    /// Identities permitted to perform admin mutations
    #[serde(default)]
    pub allowed_actors: Option<Vec<String>>,

    /// Bound on near-duplicate person pairs per scan
    #[serde(default)]
    pub near_duplicate_limit: Option<i64>,

    /// Default page size for conflict listings
    #[serde(default)]
    pub conflict_page_size: Option<i64>,
}

/// Values supplied on the command line (tier 1)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub database_path: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub allowed_actors: Option<Vec<String>>,
    pub config_file: Option<PathBuf>,
}

/// Fully resolved admin service configuration
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub database_path: PathBuf,
    pub bind_address: String,
    /// Empty list disables actor checking
    pub allowed_actors: Vec<String>,
    pub near_duplicate_limit: i64,
    pub conflict_page_size: i64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            allowed_actors: Vec::new(),
            near_duplicate_limit: DEFAULT_NEAR_DUPLICATE_LIMIT,
            conflict_page_size: DEFAULT_CONFLICT_PAGE_SIZE,
        }
    }
}

impl AdminConfig {
    /// Resolve configuration from CLI overrides, environment, TOML and defaults
    pub fn resolve(overrides: ConfigOverrides) -> Result<Self> {
        let toml_config = match overrides.config_file.clone().or_else(find_config_file) {
            Some(path) => match load_toml_config(&path) {
                Ok(config) => {
                    info!("Loaded configuration file: {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Ignoring configuration file {}: {}", path.display(), e);
                    TomlConfig::default()
                }
            },
            None => TomlConfig::default(),
        };

        Self::merge(overrides, EnvConfig::from_process(), toml_config)
    }

    /// Apply the priority order to already-collected tiers
    fn merge(overrides: ConfigOverrides, env: EnvConfig, toml: TomlConfig) -> Result<Self> {
        let defaults = AdminConfig::default();

        let database_path = overrides
            .database_path
            .or(env.database_path)
            .or(toml.database_path)
            .unwrap_or(defaults.database_path);

        let bind_address = overrides
            .bind_address
            .or(env.bind_address)
            .or(toml.bind_address)
            .unwrap_or(defaults.bind_address);

        let allowed_actors = overrides
            .allowed_actors
            .or(env.allowed_actors)
            .or(toml.allowed_actors)
            .unwrap_or_default()
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();

        let near_duplicate_limit = env
            .near_duplicate_limit
            .or(toml.near_duplicate_limit)
            .unwrap_or(defaults.near_duplicate_limit);
        if near_duplicate_limit < 1 {
            return Err(Error::Config(format!(
                "near_duplicate_limit must be positive, got {}",
                near_duplicate_limit
            )));
        }

        let conflict_page_size = toml
            .conflict_page_size
            .unwrap_or(defaults.conflict_page_size);
        if conflict_page_size < 1 {
            return Err(Error::Config(format!(
                "conflict_page_size must be positive, got {}",
                conflict_page_size
            )));
        }

        Ok(Self {
            database_path,
            bind_address,
            allowed_actors,
            near_duplicate_limit,
            conflict_page_size,
        })
    }
}

/// Environment tier (tier 2)
#[derive(Debug, Clone, Default)]
struct EnvConfig {
    database_path: Option<PathBuf>,
    bind_address: Option<String>,
    allowed_actors: Option<Vec<String>>,
    near_duplicate_limit: Option<i64>,
}

impl EnvConfig {
    fn from_process() -> Self {
        let near_duplicate_limit = std::env::var("BLB_NEAR_DUPLICATE_LIMIT")
            .ok()
            .and_then(|v| match v.parse::<i64>() {
                Ok(n) => Some(n),
                Err(_) => {
                    warn!("Ignoring non-numeric BLB_NEAR_DUPLICATE_LIMIT: {}", v);
                    None
                }
            });

        Self {
            database_path: std::env::var("BLB_DATABASE_PATH").ok().map(PathBuf::from),
            bind_address: std::env::var("BLB_BIND_ADDRESS").ok(),
            allowed_actors: std::env::var("BLB_ALLOWED_ACTORS")
                .ok()
                .map(|v| parse_actor_list(&v)),
            near_duplicate_limit,
        }
    }
}

/// Parse a comma-separated identity list such as `"alice@x.ph, bob@x.ph"`
pub fn parse_actor_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Locate the platform config file, if one exists
fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("betterlb").join("admin.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/betterlb/admin.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent default database location
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("betterlb"))
        .unwrap_or_else(|| PathBuf::from("./betterlb_data"))
        .join("betterlb.db")
}
