pub mod rate_limits;

use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::net::SocketAddr;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub http_addr: String,
    pub database_url: String,
    pub redis_url: String,
    pub s3_endpoint: String,
    pub s3_public_endpoint: Option<String>,
    pub s3_region: String,
    pub s3_bucket: String,
    pub db_max_connections: u32,
    pub db_connect_timeout_seconds: u64,
    pub db_idle_timeout_seconds: u64,
    pub db_max_lifetime_seconds: u64,
    pub paseto_access_key: [u8; 32],
    pub access_ttl_minutes: u64,
    pub image_max_bytes: usize,
    pub image_url_ttl_seconds: u64,
    pub submissions_per_hour: u32,
    pub login_attempts_per_hour: u32,
    pub migrations_dir: String,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

/// Seed account created at startup when `BOOTSTRAP_ADMIN_EMAIL` is set.
#[derive(Clone, Debug)]
pub struct BootstrapAdmin {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let http_addr = env_or("HTTP_ADDR", "0.0.0.0:8080");
        let _parsed_http_addr = SocketAddr::from_str(&http_addr)
            .map_err(|err| anyhow!("invalid HTTP_ADDR: {}", err))?;

        Ok(Self {
            http_addr,
            database_url: env_or_err("DATABASE_URL")?,
            redis_url: env_or("REDIS_URL", "redis://127.0.0.1/"),
            s3_endpoint: env_or_err("S3_ENDPOINT")?,
            s3_public_endpoint: std::env::var("S3_PUBLIC_ENDPOINT").ok(),
            s3_region: env_or("S3_REGION", "fr-par"),
            s3_bucket: env_or_err("S3_BUCKET")?,
            db_max_connections: env_or_parse("DB_MAX_CONNECTIONS", "25")?,
            db_connect_timeout_seconds: env_or_parse("DB_CONNECT_TIMEOUT_SECONDS", "5")?,
            db_idle_timeout_seconds: env_or_parse("DB_IDLE_TIMEOUT_SECONDS", "300")?,
            db_max_lifetime_seconds: env_or_parse("DB_MAX_LIFETIME_SECONDS", "1800")?,
            paseto_access_key: env_key_32("PASETO_ACCESS_KEY")?,
            access_ttl_minutes: env_or_parse("ACCESS_TTL_MINUTES", "60")?,
            image_max_bytes: env_or_parse("IMAGE_MAX_BYTES", "5242880")?,
            image_url_ttl_seconds: env_or_parse("IMAGE_URL_TTL_SECONDS", "3600")?,
            submissions_per_hour: env_or_parse("SUBMISSIONS_PER_HOUR", "20")?,
            login_attempts_per_hour: env_or_parse("LOGIN_ATTEMPTS_PER_HOUR", "10")?,
            migrations_dir: env_or("MIGRATIONS_DIR", "migrations"),
            bootstrap_admin: bootstrap_admin()?,
        })
    }
}

fn bootstrap_admin() -> Result<Option<BootstrapAdmin>> {
    let email = match std::env::var("BOOTSTRAP_ADMIN_EMAIL") {
        Ok(email) if !email.trim().is_empty() => email,
        _ => return Ok(None),
    };
    Ok(Some(BootstrapAdmin {
        name: env_or("BOOTSTRAP_ADMIN_NAME", "Administrator"),
        email,
        password: env_or_err("BOOTSTRAP_ADMIN_PASSWORD")?,
    }))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_err(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| anyhow!("missing required env var: {}", key))
}

fn env_or_parse<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
    value
        .parse::<T>()
        .map_err(|err| anyhow!("invalid {}: {}", key, err))
}

fn env_key_32(key: &str) -> Result<[u8; 32]> {
    let value = env_or_err(key)?;
    decode_key_32(key, &value)
}

fn decode_key_32(key: &str, value: &str) -> Result<[u8; 32]> {
    let decoded = STANDARD
        .decode(value.as_bytes())
        .map_err(|err| anyhow!("invalid {}: {}", key, err))?;
    if decoded.len() != 32 {
        return Err(anyhow!("invalid {}: expected 32 bytes", key));
    }
    let mut key_bytes = [0u8; 32];
    key_bytes.copy_from_slice(&decoded);
    Ok(key_bytes)
}
