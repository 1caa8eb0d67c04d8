//! Environment-driven settings.

use std::net::SocketAddr;

use chrono::Duration;
use thiserror::Error;

pub const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Process settings.
///
/// | Variable | Default |
/// |---|---|
/// | `DATABASE_URL` | unset → in-memory store |
/// | `JWT_SECRET` | `dev-secret` |
/// | `BIND_ADDR` | `0.0.0.0:8080` |
/// | `INVITATION_TTL_DAYS` | `7` |
/// | `DB_MAX_CONNECTIONS` | `5` |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub bind_addr: SocketAddr,
    pub invitation_ttl: Duration,
    pub db_max_connections: u32,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = match non_empty("BIND_ADDR") {
            Some(raw) => raw.trim().parse::<SocketAddr>().map_err(|e| ConfigError::Invalid {
                key: "BIND_ADDR",
                reason: format!("{e}"),
            })?,
            None => SocketAddr::from(([0, 0, 0, 0], 8080)),
        };

        let ttl_days: i64 = parse_or("INVITATION_TTL_DAYS", non_empty("INVITATION_TTL_DAYS"), 7)?;
        if ttl_days <= 0 {
            return Err(ConfigError::Invalid {
                key: "INVITATION_TTL_DAYS",
                reason: "must be positive".to_string(),
            });
        }

        let db_max_connections: u32 = parse_or("DB_MAX_CONNECTIONS", non_empty("DB_MAX_CONNECTIONS"), 5)?;
        if db_max_connections == 0 {
            return Err(ConfigError::Invalid {
                key: "DB_MAX_CONNECTIONS",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            database_url: non_empty("DATABASE_URL"),
            jwt_secret: non_empty("JWT_SECRET").unwrap_or_else(|| DEV_JWT_SECRET.to_string()),
            bind_addr,
            invitation_ttl: Duration::days(ttl_days),
            db_max_connections,
        })
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.database_url, None);
        assert!(s.uses_dev_secret());
        assert_eq!(s.bind_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(s.invitation_ttl, Duration::days(7));
        assert_eq!(s.db_max_connections, 5);
    }

    #[test]
    fn reads_overrides() {
        let s = settings(&[
            ("DATABASE_URL", "postgres://localhost/rentgate"),
            ("JWT_SECRET", "s3cret"),
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("INVITATION_TTL_DAYS", "14"),
        ])
        .unwrap();
        assert_eq!(s.database_url.as_deref(), Some("postgres://localhost/rentgate"));
        assert!(!s.uses_dev_secret());
        assert_eq!(s.bind_addr.port(), 9000);
        assert_eq!(s.invitation_ttl, Duration::days(14));
    }

    #[test]
    fn blank_database_url_means_in_memory() {
        assert_eq!(settings(&[("DATABASE_URL", "  ")]).unwrap().database_url, None);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            settings(&[("INVITATION_TTL_DAYS", "soon")]),
            Err(ConfigError::Invalid { key: "INVITATION_TTL_DAYS", .. })
        ));
        assert!(matches!(
            settings(&[("INVITATION_TTL_DAYS", "0")]),
            Err(ConfigError::Invalid { key: "INVITATION_TTL_DAYS", .. })
        ));
        assert!(matches!(
            settings(&[("BIND_ADDR", "not-an-addr")]),
            Err(ConfigError::Invalid { key: "BIND_ADDR", .. })
        ));
    }
}
