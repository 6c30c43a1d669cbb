//! Environment-backed configuration.
//!
//! Most settings have defaults. Override with `RELAY_*` environment variables.

pub mod error;


pub use error::ConfigError;

use std::env;
use std::net::IpAddr;
use std::time::Duration;

/// Server configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `RELAY_*` overrides on top of defaults,
/// then [`Config::validate`] before wiring anything up. The core treats the
/// values as immutable for the process lifetime.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port. Default: `8080`.
    pub port: u16,

    /// IP address to bind to. Default: `127.0.0.1`.
    pub bind_addr: IpAddr,

    /// Redis connection URL for the shared cache tier. `None` disables the
    /// remote tier entirely; the proxy then runs on the local tier alone.
    pub redis_url: Option<String>,

    /// TTL for entries written to the remote tier, in seconds. Default: `60`.
    pub cache_ttl_secs: u64,

    /// Per-attempt upstream fetch timeout, in milliseconds. Default: `5000`.
    pub fetch_timeout_ms: u64,

    /// Max retries after the first fetch attempt. Default: `2`.
    pub max_retries: u32,

    /// Base delay for exponential backoff between retries, in milliseconds.
    /// Default: `1000`.
    pub backoff_base_ms: u64,

    /// Max entries in the local cache tier (LRU-evicted). Default: `500`.
    pub local_capacity: u64,

    /// TTL for entries in the local cache tier, in seconds. Default: `300`.
    pub local_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
            redis_url: None,
            cache_ttl_secs: 60,
            fetch_timeout_ms: 5_000,
            max_retries: 2,
            backoff_base_ms: 1_000,
            local_capacity: 500,
            local_ttl_secs: 300,
        }
    }
}

impl Config {
    const ENV_PORT: &'static str = "RELAY_PORT";
    const ENV_BIND_ADDR: &'static str = "RELAY_BIND_ADDR";
    const ENV_REDIS_URL: &'static str = "RELAY_REDIS_URL";
    const ENV_CACHE_TTL_SECS: &'static str = "RELAY_CACHE_TTL_SECS";
    const ENV_FETCH_TIMEOUT_MS: &'static str = "RELAY_FETCH_TIMEOUT_MS";
    const ENV_MAX_RETRIES: &'static str = "RELAY_MAX_RETRIES";
    const ENV_BACKOFF_BASE_MS: &'static str = "RELAY_BACKOFF_BASE_MS";
    const ENV_LOCAL_CAPACITY: &'static str = "RELAY_LOCAL_CAPACITY";
    const ENV_LOCAL_TTL_SECS: &'static str = "RELAY_LOCAL_TTL_SECS";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = Self::parse_port_from_env(defaults.port)?;
        let bind_addr = Self::parse_bind_addr_from_env(defaults.bind_addr)?;
        let redis_url = Self::parse_optional_string_from_env(Self::ENV_REDIS_URL);
        let cache_ttl_secs =
            Self::parse_u64_from_env(Self::ENV_CACHE_TTL_SECS, defaults.cache_ttl_secs)?;
        let fetch_timeout_ms =
            Self::parse_u64_from_env(Self::ENV_FETCH_TIMEOUT_MS, defaults.fetch_timeout_ms)?;
        let max_retries_raw =
            Self::parse_u64_from_env(Self::ENV_MAX_RETRIES, u64::from(defaults.max_retries))?;
        // Reject values that would silently truncate before validate() runs.
        let max_retries =
            u32::try_from(max_retries_raw).map_err(|_| ConfigError::OutOfRange {
                name: Self::ENV_MAX_RETRIES,
                value: max_retries_raw,
                min: 0,
                max: 10,
            })?;
        let backoff_base_ms =
            Self::parse_u64_from_env(Self::ENV_BACKOFF_BASE_MS, defaults.backoff_base_ms)?;
        let local_capacity =
            Self::parse_u64_from_env(Self::ENV_LOCAL_CAPACITY, defaults.local_capacity)?;
        let local_ttl_secs =
            Self::parse_u64_from_env(Self::ENV_LOCAL_TTL_SECS, defaults.local_ttl_secs)?;

        Ok(Self {
            port,
            bind_addr,
            redis_url,
            cache_ttl_secs,
            fetch_timeout_ms,
            max_retries,
            backoff_base_ms,
            local_capacity,
            local_ttl_secs,
        })
    }

    /// Validates numeric ranges. Call after [`Config::from_env`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort {
                value: self.port.to_string(),
            });
        }

        Self::check_range(
            Self::ENV_FETCH_TIMEOUT_MS,
            self.fetch_timeout_ms,
            100,
            300_000,
        )?;
        Self::check_range(Self::ENV_CACHE_TTL_SECS, self.cache_ttl_secs, 1, 86_400)?;
        Self::check_range(
            Self::ENV_BACKOFF_BASE_MS,
            self.backoff_base_ms,
            1,
            60_000,
        )?;
        Self::check_range(Self::ENV_LOCAL_CAPACITY, self.local_capacity, 1, 10_000_000)?;
        Self::check_range(Self::ENV_LOCAL_TTL_SECS, self.local_ttl_secs, 1, 86_400)?;
        Self::check_range(Self::ENV_MAX_RETRIES, u64::from(self.max_retries), 0, 10)?;

        Ok(())
    }

    /// Returns the `host:port` string to bind the listener on.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// Remote-tier TTL as a [`Duration`].
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Per-attempt fetch timeout as a [`Duration`].
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Backoff base as a [`Duration`].
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    /// Local-tier TTL as a [`Duration`].
    pub fn local_ttl(&self) -> Duration {
        Duration::from_secs(self.local_ttl_secs)
    }

    fn check_range(
        name: &'static str,
        value: u64,
        min: u64,
        max: u64,
    ) -> Result<(), ConfigError> {
        if value < min || value > max {
            return Err(ConfigError::OutOfRange {
                name,
                value,
                min,
                max,
            });
        }
        Ok(())
    }

    fn parse_port_from_env(default: u16) -> Result<u16, ConfigError> {
        match env::var(Self::ENV_PORT) {
            Ok(value) => {
                let port: u16 =
                    value
                        .parse()
                        .map_err(|source| ConfigError::PortParseError {
                            value: value.clone(),
                            source,
                        })?;
                if port == 0 {
                    return Err(ConfigError::InvalidPort { value });
                }
                Ok(port)
            }
            Err(_) => Ok(default),
        }
    }

    fn parse_bind_addr_from_env(default: IpAddr) -> Result<IpAddr, ConfigError> {
        match env::var(Self::ENV_BIND_ADDR) {
            Ok(value) => value
                .parse()
                .map_err(|source| ConfigError::InvalidBindAddr { value, source }),
            Err(_) => Ok(default),
        }
    }

    fn parse_optional_string_from_env(name: &'static str) -> Option<String> {
        env::var(name).ok().filter(|v| !v.is_empty())
    }

    fn parse_u64_from_env(name: &'static str, default: u64) -> Result<u64, ConfigError> {
        match env::var(name) {
            Ok(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidNumber { name, value }),
            Err(_) => Ok(default),
        }
    }
}
