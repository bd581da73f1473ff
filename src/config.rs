use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::fmt::Display;
use std::net::IpAddr;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    /// Absent means the process runs on the in-memory store.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub webhook_secret: String,
    pub notification_webhook_url: Option<String>,
    pub api_rps: u32,
    pub submission_grace_seconds: i64,
    pub openai_api_key: Option<String>,
    pub ai_model: String,
    pub max_generated_questions: usize,
    pub cors_origins: Vec<String>,
    /// Peers whose `X-Forwarded-For` header is believed.
    pub trusted_proxies: Vec<IpAddr>,
    pub log_format: LogFormat,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let log_format = match get_env_or("LOG_FORMAT", "text").to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "text" => LogFormat::Text,
            other => {
                return Err(Error::Config(format!(
                    "Invalid value for LOG_FORMAT: {}",
                    other
                )))
            }
        };

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_optional_env("DATABASE_URL"),
            jwt_secret: get_env("JWT_SECRET")?,
            webhook_secret: get_env("WEBHOOK_SECRET")?,
            notification_webhook_url: get_optional_env("NOTIFICATION_WEBHOOK_URL"),
            api_rps: get_env_parse_in("API_RPS", 50, 1..=100_000)?,
            submission_grace_seconds: get_env_parse_in("SUBMISSION_GRACE_SECONDS", 0, 0..=86_400)?,
            openai_api_key: get_optional_env("OPENAI_API_KEY"),
            ai_model: get_env_or("AI_MODEL", "gpt-4o"),
            max_generated_questions: get_env_parse_in("MAX_GENERATED_QUESTIONS", 50, 1..=100)?,
            cors_origins: get_optional_env("CORS_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            trusted_proxies: parse_ip_list("TRUSTED_PROXIES", get_optional_env("TRUSTED_PROXIES"))?,
            log_format,
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_optional_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn get_env_or(name: &str, default: &str) -> String {
    get_optional_env(name).unwrap_or_else(|| default.to_string())
}

fn get_env_parse_in<T>(name: &str, default: T, range: RangeInclusive<T>) -> Result<T>
where
    T: FromStr + PartialOrd + Display,
    T::Err: Display,
{
    parse_in_range(name, get_optional_env(name), default, range)
}

fn parse_in_range<T>(name: &str, raw: Option<String>, default: T, range: RangeInclusive<T>) -> Result<T>
where
    T: FromStr + PartialOrd + Display,
    T::Err: Display,
{
    let value = match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e)))?,
        None => default,
    };
    if !range.contains(&value) {
        return Err(Error::Config(format!(
            "{} must be between {} and {}, got {}",
            name,
            range.start(),
            range.end(),
            value
        )));
    }
    Ok(value)
}

fn parse_ip_list(name: &str, raw: Option<String>) -> Result<Vec<IpAddr>> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .map_err(|e| Error::Config(format!("Invalid address in {}: {} ({})", name, s, e)))
        })
        .collect()
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
