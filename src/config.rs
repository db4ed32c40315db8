//! Runtime configuration
//!
//! Values come from the first command line argument (bind address) and
//! `POKER_HUB_*` environment variables, falling back to defaults.

use std::env;
use std::str::FromStr;

use crate::error::ConfigError;

/// Default server address
pub const DEFAULT_ADDR: &str = "0.0.0.0:8080";

/// Default upgrade path
pub const DEFAULT_PATH: &str = "/ws";

/// Default per-member outbound queue bound
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

/// Default hub command channel bound
pub const DEFAULT_HUB_CHANNEL_CAPACITY: usize = 256;

/// Where member identifiers come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentityMode {
    /// Always a fresh UUID v4
    #[default]
    Generated,
    /// Taken from the `uuid` query parameter when present
    ClientSupplied,
}

impl FromStr for IdentityMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "generated" => Ok(IdentityMode::Generated),
            "client" => Ok(IdentityMode::ClientSupplied),
            other => Err(ConfigError::InvalidIdentity(other.to_string())),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub addr: String,
    pub path: String,
    pub outbound_capacity: usize,
    pub hub_channel_capacity: usize,
    pub identity: IdentityMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            path: DEFAULT_PATH.to_string(),
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            hub_channel_capacity: DEFAULT_HUB_CHANNEL_CAPACITY,
            identity: IdentityMode::default(),
        }
    }
}

impl Config {
    /// Load from process arguments and environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env::args().nth(1), |key| env::var(key).ok())
    }

    /// Build a config from an optional address argument and a variable lookup
    ///
    /// The address argument wins over `POKER_HUB_ADDR`.
    pub fn from_lookup<F>(addr_arg: Option<String>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(addr) = addr_arg.or_else(|| lookup("POKER_HUB_ADDR")) {
            config.addr = addr;
        }
        if let Some(path) = lookup("POKER_HUB_PATH") {
            config.path = path;
        }
        if let Some(value) = lookup("POKER_HUB_OUTBOUND_CAPACITY") {
            config.outbound_capacity = parse_capacity("POKER_HUB_OUTBOUND_CAPACITY", value)?;
        }
        if let Some(value) = lookup("POKER_HUB_CHANNEL_CAPACITY") {
            config.hub_channel_capacity = parse_capacity("POKER_HUB_CHANNEL_CAPACITY", value)?;
        }
        if let Some(value) = lookup("POKER_HUB_IDENTITY") {
            config.identity = value.parse()?;
        }

        Ok(config)
    }
}

fn parse_capacity(name: &'static str, value: String) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidCapacity { name, value }),
    }
}
