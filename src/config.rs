//! Runtime configuration read from the environment (and `.env` via dotenvy).

use std::env;
use std::net::IpAddr;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_CHROME_EXECUTABLE: &str = "chromium";
const DEFAULT_PDF_TIMEOUT_SECS: u64 = 60;
const DEFAULT_PDF_MAX_CONCURRENCY: usize = 4;
const DEFAULT_JOB_RETENTION_SECS: u64 = 60 * 60;
const DEFAULT_JWT_SECRET: &str = "inspection-report-jwt-secret-change-in-production";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Settings for the headless rendering engine.
#[derive(Debug, Clone)]
pub struct PdfConfig {
    pub executable: String,
    pub no_sandbox: bool,
    pub timeout: Duration,
    pub max_concurrency: usize,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            executable: DEFAULT_CHROME_EXECUTABLE.to_string(),
            no_sandbox: false,
            timeout: Duration::from_secs(DEFAULT_PDF_TIMEOUT_SECS),
            max_concurrency: DEFAULT_PDF_MAX_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub pdf: PdfConfig,
    pub job_retention: Duration,
    pub notify_webhook_url: Option<String>,
    pub cors_origins: Vec<String>,
    pub jwt_secret: String,
    /// Proxies whose forwarded-for headers identify the real client.
    pub trusted_proxies: Vec<IpAddr>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let pdf = PdfConfig {
            executable: env::var("CHROME_EXECUTABLE")
                .unwrap_or_else(|_| DEFAULT_CHROME_EXECUTABLE.to_string()),
            no_sandbox: env_flag("CHROME_NO_SANDBOX"),
            timeout: Duration::from_secs(parse_env("PDF_TIMEOUT_SECS", DEFAULT_PDF_TIMEOUT_SECS)?),
            max_concurrency: parse_env("PDF_MAX_CONCURRENCY", DEFAULT_PDF_MAX_CONCURRENCY)?.max(1),
        };

        let cors_origins = env::var("CORS_ORIGINS")
            .map(|raw| split_list(&raw).map(str::to_string).collect())
            .unwrap_or_default();

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ => {
                log::warn!("JWT_SECRET not set, using the built-in development secret");
                DEFAULT_JWT_SECRET.to_string()
            }
        };

        Ok(Self {
            database_url,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            pdf,
            job_retention: Duration::from_secs(parse_env(
                "JOB_RETENTION_SECS",
                DEFAULT_JOB_RETENTION_SECS,
            )?),
            notify_webhook_url: env::var("NOTIFY_WEBHOOK_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            cors_origins,
            jwt_secret,
            trusted_proxies: parse_proxies(&env::var("TRUSTED_PROXIES").unwrap_or_default())?,
        })
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_proxies(raw: &str) -> Result<Vec<IpAddr>, ConfigError> {
    split_list(raw)
        .map(|ip| {
            ip.parse().map_err(|_| ConfigError::Invalid {
                name: "TRUSTED_PROXIES",
                value: ip.to_string(),
            })
        })
        .collect()
}

fn env_flag(name: &str) -> bool {
    matches!(
        env::var(name).as_deref().map(str::trim),
        Ok("1") | Ok("true") | Ok("TRUE") | Ok("yes")
    )
}

fn parse_env<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}
