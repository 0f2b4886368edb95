use std::{env, fmt::Display, net::SocketAddr, path::PathBuf, str::FromStr};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// `None` runs on the in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub media_root: PathBuf,
    pub media_url: String,
    pub fast_password_hashing: bool,
    /// `0` keeps tokens until logout.
    pub token_lifetime_days: u32,
}

impl Config {
    /// Reads the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        if database_url.is_none() {
            log::warn!("DATABASE_URL not set, data is kept in memory only");
        }

        Ok(Self {
            bind_address: try_load(&lookup, "BIND_ADDRESS", "0.0.0.0:8000")?,
            database_url,
            database_max_connections: try_load(&lookup, "DATABASE_MAX_CONNECTIONS", "5")?,
            media_root: try_load(&lookup, "MEDIA_ROOT", "./media")?,
            media_url: try_load(&lookup, "MEDIA_URL", "/media/")?,
            fast_password_hashing: parse_flag(
                "FAST_PASSWORD_HASHING",
                lookup("FAST_PASSWORD_HASHING"),
            )?,
            token_lifetime_days: try_load(&lookup, "TOKEN_LIFETIME_DAYS", "0")?,
        })
    }
}

fn try_load<F, T>(lookup: &F, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    let value = lookup(key).unwrap_or_else(|| {
        log::info!("{key} not set, using default: {default}");
        default.to_string()
    });

    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value,
    })
}

fn parse_flag(key: &'static str, value: Option<String>) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(false);
    };

    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value,
            reason: String::from("expected a boolean"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = Config::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.bind_address, "0.0.0.0:8000".parse().unwrap());
        assert_eq!(config.database_url, None);
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.media_root, PathBuf::from("./media"));
        assert_eq!(config.media_url, "/media/");
        assert!(!config.fast_password_hashing);
        assert_eq!(config.token_lifetime_days, 0);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(lookup(&[
            ("BIND_ADDRESS", "127.0.0.1:9000"),
            ("DATABASE_URL", "postgres://app@localhost/app"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
            ("FAST_PASSWORD_HASHING", "TRUE"),
            ("TOKEN_LIFETIME_DAYS", "30"),
        ]))
        .unwrap();

        assert_eq!(config.bind_address.port(), 9000);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://app@localhost/app")
        );
        assert_eq!(config.database_max_connections, 12);
        assert!(config.fast_password_hashing);
        assert_eq!(config.token_lifetime_days, 30);
    }

    #[test]
    fn blank_database_url_means_memory() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", "  ")])).unwrap();
        assert_eq!(config.database_url, None);
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = Config::from_lookup(lookup(&[("DATABASE_MAX_CONNECTIONS", "many")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "DATABASE_MAX_CONNECTIONS",
                ..
            }
        ));

        let err = Config::from_lookup(lookup(&[("FAST_PASSWORD_HASHING", "maybe")])).unwrap_err();
        assert!(err.to_string().contains("FAST_PASSWORD_HASHING"));
    }
}
