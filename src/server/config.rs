//! Configuration loading for hermodd.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.hermod/config.toml` (user)
//! 3. `/etc/hermod/config.toml` (system)
//! 4. built-in defaults
//!
//! Environment variables then override individual values (see
//! [`Config::apply_env`]).
//!
//! Secrets are loaded separately with mandatory permission checks:
//! 1. `~/.hermod/secrets.toml` (user, must be 0600)
//! 2. `/etc/hermod/secrets.toml` (system, must be 0600)
//! 3. `DEEPINFRA_API_KEY`

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::routing::ModelTiers;
use crate::stream::DEFAULT_MAX_CAPTURE_BYTES;
use crate::upstream::{DEFAULT_BASE_URL, GatewayConfig, RetryConfig};
use crate::{HermodError, Result};

/// Environment variable holding the upstream API key.
pub const API_KEY_ENV: &str = "DEEPINFRA_API_KEY";

/// Daemon configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub models: ModelTiers,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub quota: QuotaConfig,
}

/// Server network configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1:8787).
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            limits: LimitsConfig::default(),
        }
    }
}

fn default_address() -> String {
    "127.0.0.1:8787".to_string()
}

/// Resource limits.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum requests in flight, open event streams included (default: 100).
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent(),
        }
    }
}

fn default_max_concurrent() -> usize {
    100
}

/// Upstream API and dispatch behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-call budget in seconds (default: 60).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// History turns forwarded upstream (default: 10).
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
    /// Race cheap and heavy tiers for technical/creative requests.
    #[serde(default)]
    pub race: bool,
    /// Streamed answers larger than this are not cached (default: 256 KiB).
    #[serde(default = "default_max_capture_bytes")]
    pub max_capture_bytes: usize,
    #[serde(default)]
    pub retry: RetrySection,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            history_turns: default_history_turns(),
            race: false,
            max_capture_bytes: default_max_capture_bytes(),
            retry: RetrySection::default(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_history_turns() -> usize {
    crate::upstream::DEFAULT_HISTORY_TURNS
}

fn default_max_capture_bytes() -> usize {
    DEFAULT_MAX_CAPTURE_BYTES
}

/// Retry settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    /// Attempts including the first (default: 2).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds (default: 200).
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    2
}

fn default_initial_delay_ms() -> u64 {
    200
}

/// Response cache limits.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Default: 1,000.
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
    /// Default: 24 hours.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

fn default_max_entries() -> u64 {
    1_000
}

fn default_ttl_secs() -> u64 {
    24 * 60 * 60
}

/// Usage quota. Cap and URL both unset means no metering.
#[derive(Debug, Clone, Deserialize)]
pub struct QuotaConfig {
    /// Monthly cap in estimated tokens per identifier.
    #[serde(default)]
    pub monthly_tokens: Option<u64>,
    /// Redis URL for the usage ledger. Without it usage is kept in memory.
    #[serde(default)]
    pub redis_url: Option<String>,
    /// Budget for each ledger call before the request proceeds unmetered.
    #[serde(default = "default_ledger_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            monthly_tokens: None,
            redis_url: None,
            timeout_ms: default_ledger_timeout_ms(),
        }
    }
}

impl QuotaConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_ledger_timeout_ms() -> u64 {
    500
}

/// Secrets configuration (API keys).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub upstream: Option<ApiKeySecret>,
}

/// A single API key secret.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySecret {
    pub api_key: String,
}

impl Config {
    /// Load configuration from the standard locations and apply
    /// environment overrides.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Parse a single config file without overrides.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            HermodError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            HermodError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    /// Resolve the config file path; `None` means built-in defaults.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(HermodError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".hermod").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        let system_config = PathBuf::from("/etc/hermod/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    /// Apply overrides from the process environment.
    ///
    /// `DEFAULT_MODEL`, `HEAVY_MODEL`, `ULTRA_MODEL` set the model tiers;
    /// `MONTHLY_TOKEN_QUOTA`, `REDIS_URL`, `HERMOD_UPSTREAM_URL` and
    /// `HERMOD_ADDRESS` set their namesakes.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary lookup. Blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(model) = get("DEFAULT_MODEL") {
            self.models.cheap = Some(model);
        }
        if let Some(model) = get("HEAVY_MODEL") {
            self.models.heavy = Some(model);
        }
        if let Some(model) = get("ULTRA_MODEL") {
            self.models.ultra = Some(model);
        }
        if let Some(quota) = get("MONTHLY_TOKEN_QUOTA") {
            let quota = quota.trim().parse::<u64>().map_err(|e| {
                HermodError::Configuration(format!("MONTHLY_TOKEN_QUOTA is not a number: {e}"))
            })?;
            self.quota.monthly_tokens = Some(quota);
        }
        if let Some(url) = get("REDIS_URL") {
            self.quota.redis_url = Some(url);
        }
        if let Some(url) = get("HERMOD_UPSTREAM_URL") {
            self.upstream.base_url = url;
        }
        if let Some(address) = get("HERMOD_ADDRESS") {
            self.server.address = address;
        }
        Ok(())
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .max_entries(self.cache.max_entries)
            .ttl(Duration::from_secs(self.cache.ttl_secs))
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig::new()
            .timeout(Duration::from_secs(self.upstream.timeout_secs))
            .history_turns(self.upstream.history_turns)
            .race(self.upstream.race)
            .retry(
                RetryConfig::new()
                    .max_attempts(self.upstream.retry.max_attempts)
                    .initial_delay(Duration::from_millis(self.upstream.retry.initial_delay_ms)),
            )
    }
}

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Returns empty secrets if no file exists (the key may come from the
    /// environment).
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".hermod").join("secrets.toml");
            if user_secrets.exists() {
                return Self::load_from(&user_secrets);
            }
        }

        let system_secrets = PathBuf::from("/etc/hermod/secrets.toml");
        if system_secrets.exists() {
            return Self::load_from(&system_secrets);
        }

        Ok(Secrets::default())
    }

    /// Load one secrets file after checking its permissions.
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::check_permissions(path)?;
        let content = fs::read_to_string(path).map_err(|e| {
            HermodError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            HermodError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            HermodError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            return Err(HermodError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// Upstream API key, falling back to `DEEPINFRA_API_KEY`.
    pub fn api_key(&self) -> Option<String> {
        self.upstream
            .as_ref()
            .map(|s| s.api_key.clone())
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok())
    }
}
