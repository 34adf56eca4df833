//! Environment-driven configuration.

use std::env;
use std::path::PathBuf;

/// Fallback signing secret for local development only.
const DEV_TOKEN_SECRET: &str = "dev-secret-change-in-production";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DATABASE_URL environment variable is required")]
    MissingDatabaseUrl,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub http_addr: String,
    pub migrations_dir: PathBuf,
    pub token_secret: Vec<u8>,
}

impl Config {
    /// Reads configuration from the environment.
    ///
    /// `DATABASE_URL` is required. `HTTP_ADDR` defaults to `:8080`,
    /// `MIGRATIONS_DIR` to `migrations`. A missing
    /// `WEBSOCKET_TOKEN_SECRET` falls back to a development secret
    /// with a loud warning.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)?;

        let http_addr = normalize_addr(
            &env::var("HTTP_ADDR").unwrap_or_else(|_| ":8080".to_string()),
        );

        let migrations_dir = PathBuf::from(
            env::var("MIGRATIONS_DIR").unwrap_or_else(|_| "migrations".to_string()),
        );

        let token_secret = match env::var("WEBSOCKET_TOKEN_SECRET") {
            Ok(secret) if !secret.is_empty() => secret.into_bytes(),
            _ => {
                tracing::warn!(
                    "WEBSOCKET_TOKEN_SECRET is not set; using the dev secret"
                );
                DEV_TOKEN_SECRET.as_bytes().to_vec()
            }
        };

        Ok(Self {
            database_url,
            http_addr,
            migrations_dir,
            token_secret,
        })
    }
}

/// Accepts Go-style `:8080` addresses by binding all interfaces.
fn normalize_addr(addr: &str) -> String {
    if let Some(port) = addr.strip_prefix(':') {
        format!("0.0.0.0:{port}")
    } else {
        addr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_addr_expands_bare_port() {
        assert_eq!(normalize_addr(":8080"), "0.0.0.0:8080");
        assert_eq!(normalize_addr("127.0.0.1:9000"), "127.0.0.1:9000");
    }
}
