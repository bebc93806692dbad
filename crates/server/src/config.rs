use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Deserialize;
use server_api::DEFAULT_MAX_SIGNATURE_BYTES;

pub const DEV_SESSION_SECRET: &str = "dev-session-secret";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub session_secret: String,
    pub session_ttl_seconds: i64,
    pub max_signature_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8443".into(),
            database_url: "sqlite://./data/reviews.db".into(),
            session_secret: DEV_SESSION_SECRET.into(),
            session_ttl_seconds: 8 * 3600,
            max_signature_bytes: DEFAULT_MAX_SIGNATURE_BYTES,
        }
    }
}

pub fn load_settings() -> Settings {
    let file_cfg = fs::read_to_string("server.toml")
        .ok()
        .and_then(|raw| toml::from_str::<HashMap<String, String>>(&raw).ok())
        .unwrap_or_default();
    settings_from_sources(&file_cfg, |key| std::env::var(key).ok())
}

/// Applies `server.toml` values over the defaults, then environment variables over both.
/// `APP__*` variables win over their legacy unprefixed names.
pub fn settings_from_sources(
    file_cfg: &HashMap<String, String>,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Some(v) = file_cfg.get("bind_addr") {
        settings.server_bind = v.clone();
    }
    if let Some(v) = file_cfg.get("database_url") {
        settings.database_url = v.clone();
    }
    if let Some(v) = file_cfg.get("session_secret") {
        settings.session_secret = v.clone();
    }
    if let Some(v) = file_cfg
        .get("session_ttl_seconds")
        .and_then(|v| v.parse().ok())
    {
        settings.session_ttl_seconds = v;
    }
    if let Some(v) = file_cfg
        .get("max_signature_bytes")
        .and_then(|v| v.parse().ok())
    {
        settings.max_signature_bytes = v;
    }

    if let Some(v) = env("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = env("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Some(v) = env("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = env("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Some(v) = env("APP__SESSION_SECRET") {
        settings.session_secret = v;
    }

    if let Some(v) = env("APP__SESSION_TTL_SECONDS") {
        if let Ok(parsed) = v.parse::<i64>() {
            settings.session_ttl_seconds = parsed;
        }
    }

    if let Some(v) = env("APP__MAX_SIGNATURE_BYTES") {
        if let Ok(parsed) = v.parse::<usize>() {
            settings.max_signature_bytes = parsed;
        }
    }

    settings
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:") {
        return raw_database_url.to_string();
    }

    let path = if let Some(path) = raw_database_url.strip_prefix("sqlite://") {
        path
    } else if raw_database_url.contains("://") {
        return raw_database_url.to_string();
    } else if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        path
    } else {
        raw_database_url
    };

    let path = path.replace('\\', "/");
    if has_windows_drive_prefix(&path) {
        format!("sqlite:{path}")
    } else {
        format!("sqlite://{path}")
    }
}

fn has_windows_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
