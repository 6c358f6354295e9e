//! Application configuration loaded from environment variables.

use std::str::FromStr;

use chrono::Duration;

use crate::errors::{Result, ServerError};

/// Longest admin session the server will issue: 30 days.
pub const MAX_SESSION_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Which [`RaffleStore`](crate::store::RaffleStore) implementation backs the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => Err(ServerError::Config(format!(
                "Invalid STORE_BACKEND: {other} (expected sqlite or memory)"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the REST API server
    pub api_port: u16,
    /// SQLite database URL (e.g. sqlite:./raffles.db)
    pub database_url: String,
    pub store_backend: StoreBackend,
    /// Import the sample catalog when the store starts empty
    pub seed_sample_data: bool,
    pub admin_username: String,
    pub admin_password: String,
    /// How long an admin session stays valid
    pub session_ttl_secs: u64,
    /// How often (in seconds) the maintenance task runs
    pub sweep_interval_secs: u64,
    /// Move raffles through their lifecycle as dates pass
    pub auto_advance_status: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            api_port: parse_var("API_PORT", 3001)?,
            database_url: env_var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./raffles.db".to_string()),
            store_backend: env_var("STORE_BACKEND")
                .unwrap_or_else(|_| "sqlite".to_string())
                .parse()?,
            seed_sample_data: parse_var("SEED_SAMPLE_DATA", true)?,
            admin_username: env_var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string()),
            admin_password: env_var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string()),
            session_ttl_secs: check_session_ttl(parse_var("SESSION_TTL_SECS", 8 * 60 * 60)?)?,
            sweep_interval_secs: parse_var("SWEEP_INTERVAL_SECS", 60)?,
            auto_advance_status: parse_var("AUTO_ADVANCE_STATUS", false)?,
        })
    }

    /// Session lifetime, capped at [`MAX_SESSION_TTL_SECS`].
    pub fn session_ttl(&self) -> Duration {
        Duration::seconds(self.session_ttl_secs.min(MAX_SESSION_TTL_SECS) as i64)
    }
}

fn check_session_ttl(secs: u64) -> Result<u64> {
    if secs > MAX_SESSION_TTL_SECS {
        return Err(ServerError::Config(format!(
            "Invalid SESSION_TTL_SECS: {secs} (at most {MAX_SESSION_TTL_SECS})"
        )));
    }
    Ok(secs)
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| ServerError::Config(format!("Missing env var: {key}")))
}

fn parse_var<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env_var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ServerError::Config(format!("Invalid {key}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_backend_parses_case_insensitively() {
        assert_eq!("SQLite".parse::<StoreBackend>().unwrap(), StoreBackend::Sqlite);
        assert_eq!("memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert!(matches!(
            "postgres".parse::<StoreBackend>(),
            Err(ServerError::Config(_))
        ));
    }

    #[test]
    fn unset_variable_falls_back_to_default() {
        let port: u16 = parse_var("RAFFLE_TEST_UNSET_PORT", 4242).unwrap();
        assert_eq!(port, 4242);
    }

    #[test]
    fn session_ttl_is_bounded() {
        assert_eq!(check_session_ttl(3600).unwrap(), 3600);
        assert_eq!(
            check_session_ttl(MAX_SESSION_TTL_SECS).unwrap(),
            MAX_SESSION_TTL_SECS
        );
        assert!(matches!(
            check_session_ttl(1_000_000_000_000_000),
            Err(ServerError::Config(_))
        ));

        let config = Config {
            session_ttl_secs: u64::MAX,
            ..crate::api::tests::test_config()
        };
        assert_eq!(
            config.session_ttl(),
            Duration::seconds(MAX_SESSION_TTL_SECS as i64)
        );
    }
}
