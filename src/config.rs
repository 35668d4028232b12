use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

use crate::error::{NestwatchError, Result};

pub const DEFAULT_STORE_TIMEOUT_SECONDS: u64 = 10;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    pub url: String,
    pub service_key: String,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: Option<u16>,
    pub username: String,
    pub password: String,
    pub from_address: String,
    pub sender_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub store: StoreConfig,
    pub smtp: Option<SmtpConfig>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| NestwatchError::Config(e.to_string()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| NestwatchError::Config(e.to_string()))?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self> {
        let url = require_env("NESTWATCH_STORE_URL")?;
        let service_key = require_env("NESTWATCH_STORE_KEY")?;
        let timeout_seconds = match env::var("NESTWATCH_STORE_TIMEOUT_SECONDS") {
            Ok(raw) => Some(
                raw.parse::<u64>()
                    .map_err(|e| NestwatchError::Config(e.to_string()))?,
            ),
            Err(_) => None,
        };

        let smtp = match env::var("SMTP_HOST") {
            Ok(host) => Some(SmtpConfig {
                host,
                port: match env::var("SMTP_PORT") {
                    Ok(raw) => Some(
                        raw.parse::<u16>()
                            .map_err(|e| NestwatchError::Config(e.to_string()))?,
                    ),
                    Err(_) => None,
                },
                username: require_env("SMTP_USER")?,
                password: require_env("SMTP_PASSWORD")?,
                from_address: require_env("SMTP_FROM")?,
                sender_name: env::var("SMTP_SENDER_NAME").ok(),
            }),
            Err(_) => None,
        };

        Ok(Self {
            store: StoreConfig {
                url,
                service_key,
                timeout_seconds,
            },
            smtp,
        })
    }
}

fn require_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| NestwatchError::Config(format!("{name} is not set")))
}
