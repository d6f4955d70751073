//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;

/// Default bind address.
pub const DEFAULT_ADDR: &str = "127.0.0.1:8788";

/// API server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address.
    pub addr: SocketAddr,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `ROUNDTABLE_API_ADDR` | Server bind address | `127.0.0.1:8788` |
    ///
    /// Gateway and director settings are read by their own crates.
    pub fn from_env() -> Result<Self, ConfigError> {
        let addr = env::var("ROUNDTABLE_API_ADDR")
            .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidAddr)?;

        Ok(Self { addr })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid ROUNDTABLE_API_ADDR format")]
    InvalidAddr,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_addr_from_env() {
        let _guard = ENV_LOCK.lock().unwrap();

        env::remove_var("ROUNDTABLE_API_ADDR");
        let config = Config::from_env().unwrap();
        assert_eq!(config.addr.to_string(), DEFAULT_ADDR);

        env::set_var("ROUNDTABLE_API_ADDR", "0.0.0.0:9000");
        assert_eq!(Config::from_env().unwrap().addr.port(), 9000);

        env::set_var("ROUNDTABLE_API_ADDR", "not an address");
        assert!(matches!(Config::from_env(), Err(ConfigError::InvalidAddr)));

        env::remove_var("ROUNDTABLE_API_ADDR");
    }
}
