use std::net::SocketAddr;

use anyhow::Context;
use serde::Deserialize;

/// Secrets used by the token codec. Both must stay stable across restarts,
/// otherwise every issued token stops decoding.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub encryption_secret: String,
    pub signing_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// `None` runs the service on the in-memory store.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub token: TokenConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let host = std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = match std::env::var("APP_PORT") {
            Ok(v) => v.parse::<u16>().context("APP_PORT must be a port number")?,
            Err(_) => 3000,
        };
        let token = TokenConfig {
            encryption_secret: required_secret("TOKEN_ENCRYPTION_SECRET")?,
            signing_secret: required_secret("TOKEN_SIGNING_SECRET")?,
        };
        Ok(Self {
            database_url,
            host,
            port,
            token,
        })
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

fn required_secret(name: &str) -> anyhow::Result<String> {
    let value = std::env::var(name).with_context(|| format!("{name} must be set"))?;
    anyhow::ensure!(!value.is_empty(), "{name} must not be empty");
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(host: &str, port: u16) -> AppConfig {
        AppConfig {
            database_url: None,
            host: host.into(),
            port,
            token: TokenConfig {
                encryption_secret: "enc".into(),
                signing_secret: "sig".into(),
            },
        }
    }

    #[test]
    fn bind_addr_joins_host_and_port() {
        let addr = config("127.0.0.1", 3000).bind_addr().expect("valid addr");
        assert_eq!(addr.to_string(), "127.0.0.1:3000");
    }

    #[test]
    fn bind_addr_rejects_garbage_host() {
        assert!(config("not a host", 80).bind_addr().is_err());
    }
}
