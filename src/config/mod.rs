//! Application configuration management

use std::env;

use anyhow::{Context, Result, bail};

use crate::ent::{ClientConfig, DEFAULT_TYPE_TABLE};

/// Log output format selected with `LOG_FORMAT`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => bail!("unknown log format {:?} (expected json or pretty)", other),
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host to bind (defaults to all interfaces)
    pub host: Option<String>,

    /// Server port
    pub port: u16,

    /// SQLite connection URL
    pub database_url: String,

    /// Maximum pool size
    pub database_max_connections: u32,

    /// Table listing entity tables in table-index order
    pub type_table: String,

    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: env::var("HOST").ok(),

            port: env::var("PORT")
                .unwrap_or_else(|_| "4000".to_string())
                .parse()
                .context("Invalid PORT")?,

            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./data/workgraph.db".to_string()),

            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid DATABASE_MAX_CONNECTIONS")?,

            type_table: env::var("ENT_TYPE_TABLE")
                .unwrap_or_else(|_| DEFAULT_TYPE_TABLE.to_string()),

            log_format: env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "json".to_string())
                .parse()
                .context("Invalid LOG_FORMAT")?,
        })
    }

    /// Address to bind the HTTP server to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host.as_deref().unwrap_or("0.0.0.0"), self.port)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            type_table: self.type_table.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_bind_addr_defaults_to_all_interfaces() {
        let config = Config {
            host: None,
            port: 4000,
            database_url: "sqlite::memory:".into(),
            database_max_connections: 1,
            type_table: DEFAULT_TYPE_TABLE.into(),
            log_format: LogFormat::Json,
        };
        assert_eq!(config.bind_addr(), "0.0.0.0:4000");
    }
}
