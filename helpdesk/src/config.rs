//! Application configuration
//!
//! Central location for configuration constants, validation boundaries,
//! and the environment-driven client configuration.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

// ===== Session Storage Keys =====

/// Storage key holding the bearer token
pub const TOKEN_KEY: &str = "token";

/// Storage key holding the serialized user record
pub const USER_KEY: &str = "user";

// ===== Session Lifecycle =====

/// Pause between clearing a previous user's session and establishing a
/// new one, so subscribers observe the logged-out state.
pub const RELOGIN_DELAY_MS: u64 = 100;

// ===== Filter Limits =====

/// Maximum length of a saved filter name
pub const MAX_FILTER_NAME_LENGTH: usize = 100;

/// Maximum length of a saved filter description
pub const MAX_FILTER_DESCRIPTION_LENGTH: usize = 500;

// ===== Notifications =====

/// Most notifications kept at once; the oldest are dropped beyond this
pub const MAX_NOTIFICATIONS: usize = 50;

/// Age in seconds after which a notification is no longer shown
pub const NOTIFICATION_TTL_SECS: i64 = 300;

// ===== HTTP =====

/// Default base URL of the backend API
pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";

/// Per-request timeout in seconds
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

// ===== Dashboard =====

/// Default number of days covered by the dashboard time series
pub const DEFAULT_DASHBOARD_DAYS: u32 = 30;

/// Default ticket page size for list views
pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// Directory name created under the platform data dir
const APP_DIR_NAME: &str = "helpdesk-mefasa";

/// Auto-refresh interval choices offered by the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(try_from = "u64", into = "u64")]
pub enum RefreshInterval {
    TenSeconds,
    #[default]
    ThirtySeconds,
    OneMinute,
    TwoMinutes,
    FiveMinutes,
}

impl RefreshInterval {
    pub const ALL: [RefreshInterval; 5] = [
        RefreshInterval::TenSeconds,
        RefreshInterval::ThirtySeconds,
        RefreshInterval::OneMinute,
        RefreshInterval::TwoMinutes,
        RefreshInterval::FiveMinutes,
    ];

    pub fn as_secs(self) -> u64 {
        match self {
            RefreshInterval::TenSeconds => 10,
            RefreshInterval::ThirtySeconds => 30,
            RefreshInterval::OneMinute => 60,
            RefreshInterval::TwoMinutes => 120,
            RefreshInterval::FiveMinutes => 300,
        }
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_secs(self.as_secs())
    }
}

impl TryFrom<u64> for RefreshInterval {
    type Error = String;

    fn try_from(secs: u64) -> std::result::Result<Self, Self::Error> {
        RefreshInterval::ALL
            .into_iter()
            .find(|interval| interval.as_secs() == secs)
            .ok_or_else(|| {
                format!(
                    "Unsupported refresh interval {}s (expected 10, 30, 60, 120 or 300)",
                    secs
                )
            })
    }
}

impl From<RefreshInterval> for u64 {
    fn from(interval: RefreshInterval) -> Self {
        interval.as_secs()
    }
}

/// Whether keyring has a real credential store on the build target;
/// elsewhere it would silently keep secrets in memory only
pub const NATIVE_KEYRING: bool = cfg!(any(
    target_os = "windows",
    target_os = "macos",
    target_os = "ios",
    target_os = "linux"
));

/// Where the session token and user record are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionBackend {
    #[default]
    File,
    Keyring,
}

/// Runtime configuration of the client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every API path is joined to
    pub api_base_url: String,
    /// HTTP proxy every backend request is routed through, if any
    pub proxy_target: Option<String>,
    pub refresh_interval: RefreshInterval,
    pub data_dir: PathBuf,
    pub session_backend: SessionBackend,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_base_url: impl Into<String>, data_dir: PathBuf) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            proxy_target: None,
            refresh_interval: RefreshInterval::default(),
            data_dir,
            session_backend: SessionBackend::default(),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }

    /// Load configuration from the process environment, reading `.env` first
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {:?}", path);
        }

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base_url = lookup("HELPDESK_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        url::Url::parse(&api_base_url)
            .map_err(|e| AppError::Config(format!("HELPDESK_API_URL is not a valid URL: {}", e)))?;

        let refresh_interval = match lookup("HELPDESK_REFRESH_INTERVAL") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    AppError::Config(format!("HELPDESK_REFRESH_INTERVAL is not a number: {}", raw))
                })?;
                RefreshInterval::try_from(secs).map_err(AppError::Config)?
            }
            None => RefreshInterval::default(),
        };

        let proxy_target = lookup("HELPDESK_PROXY_TARGET").filter(|s| !s.trim().is_empty());
        if let Some(target) = &proxy_target {
            url::Url::parse(target).map_err(|e| {
                AppError::Config(format!("HELPDESK_PROXY_TARGET is not a valid URL: {}", e))
            })?;
        }

        let session_backend = match lookup("HELPDESK_SESSION_STORE").as_deref() {
            None | Some("file") => SessionBackend::File,
            Some("keyring") if NATIVE_KEYRING => SessionBackend::Keyring,
            Some("keyring") => {
                return Err(AppError::Config(
                    "HELPDESK_SESSION_STORE=keyring has no credential store on this platform, use 'file'"
                        .to_string(),
                ))
            }
            Some(other) => {
                return Err(AppError::Config(format!(
                    "HELPDESK_SESSION_STORE must be 'file' or 'keyring', got '{}'",
                    other
                )))
            }
        };

        let data_dir = match lookup("HELPDESK_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .ok_or_else(|| AppError::Config("Could not determine the data directory".to_string()))?
                .join(APP_DIR_NAME),
        };

        Ok(Self {
            api_base_url,
            proxy_target,
            refresh_interval,
            data_dir,
            session_backend,
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        })
    }
}
