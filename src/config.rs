use std::env;

/// Runtime configuration, read from the environment after `.env` is loaded
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Mark the session cookie `Secure`; turn on behind HTTPS
    pub cookie_secure: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value: {value}")]
    InvalidValue { name: &'static str, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://budgetbeacon.sqlite3".to_string());
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port: u16 = match env::var("PORT") {
            Ok(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue { name: "PORT", value })?,
            Err(_) => 8080,
        };

        let cookie_secure = match env::var("COOKIE_SECURE") {
            Ok(value) => parse_flag(&value)
                .ok_or(ConfigError::InvalidValue { name: "COOKIE_SECURE", value })?,
            Err(_) => false,
        };

        Ok(Self {
            database_url,
            host,
            port,
            cookie_secure,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("true"), Some(true));
        assert_eq!(parse_flag(" ON "), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag(""), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_bind_address() {
        let config = Config {
            database_url: "sqlite::memory:".to_string(),
            host: "0.0.0.0".to_string(),
            port: 9000,
            cookie_secure: false,
        };
        assert_eq!(config.bind_address(), "0.0.0.0:9000");
    }
}
