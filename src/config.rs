use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use tracing::warn;
use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub database_url: String,
    /// Build-time / environment key; the stored user key takes precedence.
    pub gemini_api_key: String,
    pub gemini_api_base: String,
    pub gemini_text_model: String,
    pub gemini_image_model: String,
    pub gemini_image_aspect_ratio: String,
    pub gemini_image_size: String,
    pub gemini_safety_settings: String,
    pub gemini_request_timeout_secs: u64,
    pub persona_language: String,
    pub success_hold_ms: u64,
    pub output_dir: PathBuf,
}

pub static CONFIG: Lazy<Config> =
    Lazy::new(|| Config::load().expect("Failed to load configuration"));

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

fn normalize_gemini_safety_settings(value: String) -> String {
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

fn normalize_api_base(value: &str) -> Result<String> {
    let trimmed = value.trim().trim_end_matches('/');
    let parsed = Url::parse(trimmed)
        .map_err(|err| anyhow!("Invalid GEMINI_API_BASE '{}': {}", value, err))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(anyhow!(
            "GEMINI_API_BASE must be an http(s) URL, got '{}'",
            value
        ));
    }
    Ok(trimmed.to_string())
}

impl Config {
    pub fn load() -> Result<Self> {
        let gemini_api_base = normalize_api_base(&env_string(
            "GEMINI_API_BASE",
            "https://generativelanguage.googleapis.com/v1beta",
        ))?;

        Ok(Config {
            log_level: env_string("LOG_LEVEL", "info"),
            database_url: env_string("DATABASE_URL", "sqlite://persona_studio.db?mode=rwc"),
            gemini_api_key: env_string("GEMINI_API_KEY", ""),
            gemini_api_base,
            gemini_text_model: env_string("GEMINI_TEXT_MODEL", "gemini-2.5-flash"),
            gemini_image_model: env_string("GEMINI_IMAGE_MODEL", "gemini-3-pro-image-preview"),
            gemini_image_aspect_ratio: env_string("GEMINI_IMAGE_ASPECT_RATIO", "1:1"),
            gemini_image_size: env_string("GEMINI_IMAGE_SIZE", "2K"),
            gemini_safety_settings: normalize_gemini_safety_settings(env_string(
                "GEMINI_SAFETY_SETTINGS",
                "permissive",
            )),
            gemini_request_timeout_secs: env_u64("GEMINI_REQUEST_TIMEOUT_SECS", 120).max(1),
            persona_language: env_string("PERSONA_LANGUAGE", "Korean"),
            success_hold_ms: env_u64("SUCCESS_HOLD_MS", 1000),
            output_dir: PathBuf::from(env_string("OUTPUT_DIR", "output")),
        })
    }

    pub fn success_hold(&self) -> Duration {
        Duration::from_millis(self.success_hold_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_base_drops_trailing_slash() {
        let base = normalize_api_base("https://generativelanguage.googleapis.com/v1beta/").unwrap();
        assert_eq!(base, "https://generativelanguage.googleapis.com/v1beta");
    }

    #[test]
    fn api_base_rejects_non_http_urls() {
        assert!(normalize_api_base("ftp://example.com").is_err());
        assert!(normalize_api_base("not a url").is_err());
    }

    #[test]
    fn safety_profile_falls_back_to_permissive() {
        assert_eq!(normalize_gemini_safety_settings("OFF".into()), "permissive");
        assert_eq!(normalize_gemini_safety_settings("standard".into()), "standard");
        assert_eq!(normalize_gemini_safety_settings("strictest".into()), "permissive");
    }
}
