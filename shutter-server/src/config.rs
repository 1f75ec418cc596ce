use std::{env, path::PathBuf};

use thiserror::Error;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9050;
pub const DEFAULT_MEDIA_ROOT: &str = "./media";
pub const DEFAULT_MEDIA_URL: &str = "/media/";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Runtime configuration, read from `SHUTTER_*` environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Postgres connection URL. An in-memory database is used when absent.
    pub database_url: Option<String>,
    pub media_root: PathBuf,
    /// Public URL prefix of uploaded files, always starting and ending with `/`
    pub media_url: String,
    pub max_upload_bytes: usize,
    pub contact_recipients: Vec<String>,
    /// SMTP URL understood by lettre. Mail is logged instead when absent.
    pub smtp_url: Option<String>,
    pub secure_cookies: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{variable} has invalid value {value:?}: {reason}")]
    Invalid {
        variable: &'static str,
        value: String,
        reason: String,
    },
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: None,
            media_root: DEFAULT_MEDIA_ROOT.into(),
            media_url: DEFAULT_MEDIA_URL.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            contact_recipients: vec![],
            smtp_url: None,
            secure_cookies: false,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any variable source, unset or blank values fall back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let port = match get("SHUTTER_SERVER_PORT") {
            Some(value) => value.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
                variable: "SHUTTER_SERVER_PORT",
                value,
                reason: e.to_string(),
            })?,
            None => defaults.port,
        };

        let max_upload_bytes = match get("SHUTTER_MAX_UPLOAD_BYTES") {
            Some(value) => value.trim().parse::<usize>().map_err(|e| ConfigError::Invalid {
                variable: "SHUTTER_MAX_UPLOAD_BYTES",
                value,
                reason: e.to_string(),
            })?,
            None => defaults.max_upload_bytes,
        };

        let secure_cookies = match get("SHUTTER_SECURE_COOKIES") {
            Some(value) => parse_bool(&value).ok_or_else(|| ConfigError::Invalid {
                variable: "SHUTTER_SECURE_COOKIES",
                value,
                reason: "expected true or false".to_string(),
            })?,
            None => defaults.secure_cookies,
        };

        let media_url = match get("SHUTTER_MEDIA_URL") {
            Some(value) => normalize_media_url(&value).ok_or_else(|| ConfigError::Invalid {
                variable: "SHUTTER_MEDIA_URL",
                value,
                reason: "must be a path below the root, such as /media/".to_string(),
            })?,
            None => defaults.media_url,
        };

        let contact_recipients = get("SHUTTER_CONTACT_RECIPIENTS")
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            port,
            database_url: get("SHUTTER_DATABASE_URL"),
            media_root: get("SHUTTER_MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.media_root),
            media_url,
            max_upload_bytes,
            contact_recipients,
            smtp_url: get("SHUTTER_SMTP_URL"),
            secure_cookies,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn normalize_media_url(value: &str) -> Option<String> {
    let trimmed = value.trim().trim_matches('/');

    if trimmed.is_empty() || trimmed.contains(char::is_whitespace) {
        return None;
    }

    Some(format!("/{}/", trimmed))
}
