use std::net::SocketAddr;
use std::path::PathBuf;

/// Secrets from sample files. Refused at startup.
const PLACEHOLDER_SECRETS: &[&str] = &["", "dev-secret-change-me", "change-me", "secret"];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("AGORA_JWT_SECRET must be set")]
    MissingSecret,
    #[error("AGORA_JWT_SECRET is a placeholder value; set a real secret")]
    PlaceholderSecret,
    #[error("invalid {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub locale: String,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let jwt_secret = lookup("AGORA_JWT_SECRET").ok_or(ConfigError::MissingSecret)?;
        if PLACEHOLDER_SECRETS.contains(&jwt_secret.trim()) {
            return Err(ConfigError::PlaceholderSecret);
        }

        let port_value = lookup("AGORA_PORT").unwrap_or_else(|| "3000".into());
        let port = port_value.parse().map_err(|_| ConfigError::Invalid {
            name: "AGORA_PORT",
            value: port_value.clone(),
        })?;

        Ok(Self {
            jwt_secret,
            db_path: PathBuf::from(lookup("AGORA_DB_PATH").unwrap_or_else(|| "agora.db".into())),
            host: lookup("AGORA_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            locale: lookup("AGORA_LOCALE").unwrap_or_else(|| "en".into()),
        })
    }

    pub fn addr(&self) -> Result<SocketAddr, ConfigError> {
        let value = format!("{}:{}", self.host, self.port);
        value.parse().map_err(|_| ConfigError::Invalid { name: "AGORA_HOST", value })
    }
}
