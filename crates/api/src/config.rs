//! Process configuration read from the environment.

use std::net::SocketAddr;

use anyhow::Context;

pub const BIND_ADDR_ENV: &str = "STOCKROOM_BIND_ADDR";
pub const DATABASE_URL_ENV: &str = "STOCKROOM_DATABASE_URL";
pub const DB_MAX_CONNECTIONS_ENV: &str = "STOCKROOM_DB_MAX_CONNECTIONS";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_DATABASE_URL: &str = "sqlite::memory:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub db_max_connections: u32,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key/value source. Unset keys take
    /// their defaults; set but unparsable values are an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let raw_addr = lookup(BIND_ADDR_ENV).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("{BIND_ADDR_ENV}={raw_addr} is not a socket address"))?;

        let database_url =
            lookup(DATABASE_URL_ENV).unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let db_max_connections = match lookup(DB_MAX_CONNECTIONS_ENV) {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .with_context(|| {
                    format!("{DB_MAX_CONNECTIONS_ENV}={raw} is not a positive integer")
                })?,
            None if database_url.contains(":memory:") => 1,
            None => 5,
        };

        Ok(Self {
            bind_addr,
            database_url,
            db_max_connections,
        })
    }

    /// In-memory database on an ephemeral localhost port.
    pub fn ephemeral() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            db_max_connections: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_to_in_memory_database_on_port_8080() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(cfg.database_url, "sqlite::memory:");
        assert_eq!(cfg.db_max_connections, 1);
    }

    #[test]
    fn file_database_gets_a_larger_pool() {
        let cfg = config(&[(DATABASE_URL_ENV, "sqlite://stock.db")]).unwrap();
        assert_eq!(cfg.db_max_connections, 5);

        let cfg = config(&[
            (DATABASE_URL_ENV, "sqlite://stock.db"),
            (DB_MAX_CONNECTIONS_ENV, "12"),
        ])
        .unwrap();
        assert_eq!(cfg.db_max_connections, 12);
    }

    #[test]
    fn invalid_values_fail_with_the_variable_name() {
        let err = config(&[(BIND_ADDR_ENV, "not-an-addr")]).unwrap_err();
        assert!(err.to_string().contains(BIND_ADDR_ENV));

        let err = config(&[(DB_MAX_CONNECTIONS_ENV, "0")]).unwrap_err();
        assert!(err.to_string().contains(DB_MAX_CONNECTIONS_ENV));
    }
}
