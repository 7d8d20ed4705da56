use std::env;
use std::time::Duration;

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use tracing::warn;
use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub log_level: String,
    pub database_url: String,
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub gemini_text_model: String,
    pub gemini_image_model: String,
    pub gemini_temperature: f32,
    pub gemini_safety_settings: String,
    pub gemini_request_timeout_seconds: u64,
    pub rate_limit_seconds: u64,
    pub roster_max_entries: usize,
    pub telegram_max_length: usize,
}

pub static CONFIG: Lazy<Config> =
    Lazy::new(|| Config::load().expect("Failed to load configuration"));

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_f32(name: &str, default: f32) -> f32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<f32>().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}

pub(crate) fn normalize_database_url(value: String) -> String {
    if value.starts_with("sqlite+aiosqlite://") {
        return value.replacen("sqlite+aiosqlite://", "sqlite://", 1);
    }
    value
}

pub(crate) fn normalize_gemini_safety_settings(value: String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "permissive".to_string();
    }

    let lowered = trimmed.to_lowercase();
    match lowered.as_str() {
        "permissive" | "off" | "none" => "permissive".to_string(),
        "standard" => "standard".to_string(),
        _ => {
            warn!(
                "Unknown GEMINI_SAFETY_SETTINGS value '{}'; defaulting to permissive.",
                value
            );
            "permissive".to_string()
        }
    }
}

pub(crate) fn normalize_base_url(value: &str) -> Result<String> {
    let parsed = Url::parse(value.trim())
        .map_err(|err| anyhow!("GEMINI_BASE_URL '{}' is not a valid URL: {}", value, err))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(anyhow!(
            "GEMINI_BASE_URL must use http or https, got '{}'",
            parsed.scheme()
        ));
    }
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

impl Config {
    pub fn load() -> Result<Self> {
        let gemini_base_url = normalize_base_url(&env_string(
            "GEMINI_BASE_URL",
            "https://generativelanguage.googleapis.com",
        ))?;

        let gemini_temperature = env_f32("GEMINI_TEMPERATURE", 0.9);
        if !(0.0..=2.0).contains(&gemini_temperature) {
            return Err(anyhow!(
                "GEMINI_TEMPERATURE must be within 0.0..=2.0, got {}",
                gemini_temperature
            ));
        }

        Ok(Config {
            bot_token: env_string("BOT_TOKEN", ""),
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            database_url: normalize_database_url(env_string("DATABASE_URL", "sqlite://forge.db")),
            gemini_api_key: env_string("GEMINI_API_KEY", ""),
            gemini_base_url,
            gemini_text_model: env_string("GEMINI_TEXT_MODEL", "gemini-2.5-flash"),
            gemini_image_model: env_string("GEMINI_IMAGE_MODEL", "gemini-2.5-flash-image"),
            gemini_temperature,
            gemini_safety_settings: normalize_gemini_safety_settings(env_string(
                "GEMINI_SAFETY_SETTINGS",
                "permissive",
            )),
            gemini_request_timeout_seconds: env_u64("GEMINI_REQUEST_TIMEOUT_SECONDS", 120).max(5),
            rate_limit_seconds: env_u64("RATE_LIMIT_SECONDS", 15),
            roster_max_entries: env_usize("ROSTER_MAX_ENTRIES", 50).max(1),
            telegram_max_length: env_usize("TELEGRAM_MAX_LENGTH", 4000),
        })
    }

    pub fn gemini_request_timeout(&self) -> Duration {
        Duration::from_secs(self.gemini_request_timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_legacy_sqlite_scheme() {
        assert_eq!(
            normalize_database_url("sqlite+aiosqlite:///forge.db".to_string()),
            "sqlite:///forge.db"
        );
        assert_eq!(
            normalize_database_url("sqlite://forge.db".to_string()),
            "sqlite://forge.db"
        );
    }

    #[test]
    fn unknown_safety_profile_falls_back_to_permissive() {
        assert_eq!(
            normalize_gemini_safety_settings("STANDARD".to_string()),
            "standard"
        );
        assert_eq!(
            normalize_gemini_safety_settings("paranoid".to_string()),
            "permissive"
        );
        assert_eq!(normalize_gemini_safety_settings("  ".to_string()), "permissive");
    }

    #[test]
    fn base_url_is_trimmed_and_validated() {
        assert_eq!(
            normalize_base_url("https://generativelanguage.googleapis.com/").unwrap(),
            "https://generativelanguage.googleapis.com"
        );
        assert!(normalize_base_url("ftp://example.com").is_err());
        assert!(normalize_base_url("not a url").is_err());
    }
}
