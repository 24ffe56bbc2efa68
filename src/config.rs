//! Configuration module for search-gateway service

use std::env;
use std::str::FromStr;

use crate::error::{GatewayError, GatewayResult};

#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub port: u16,
    pub host: String,

    // Elasticsearch
    pub elastic_endpoint: String,
    pub elastic_username: String,
    pub elastic_password: String,
    pub elastic_timeout_secs: u64,

    // Search defaults
    pub default_index: String,

    // Logging
    pub log_json: bool,
}

impl Config {
    pub fn from_env() -> GatewayResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (the process environment in production).
    pub fn from_lookup<F>(lookup: F) -> GatewayResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let string_or = |key: &str, default: &str| {
            lookup(key).unwrap_or_else(|| default.to_string())
        };

        Ok(Self {
            port: parse_var(&lookup, "PORT", 3020)?,
            host: string_or("HOST", "0.0.0.0"),

            elastic_endpoint: string_or("ELASTIC_ENDPOINT", "http://localhost:9200"),
            elastic_username: lookup("ELASTIC_USERNAME").unwrap_or_default(),
            elastic_password: lookup("ELASTIC_PASSWORD").unwrap_or_default(),
            elastic_timeout_secs: parse_var(&lookup, "ELASTIC_TIMEOUT_SECS", 10)?,

            default_index: string_or("DEFAULT_INDEX", "profile"),

            log_json: string_or("LOG_FORMAT", "pretty").eq_ignore_ascii_case("json"),
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> GatewayResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| GatewayError::Config(format!("Invalid {}: {}", key, raw))),
        None => Ok(default),
    }
}
