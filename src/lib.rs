// Shared core for the Trouvaille lost-and-found app.
//
// Pure Crux app: all side effects (HTTP, key-value storage, rendering) are
// capability requests fulfilled by the platform shell.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod api;
pub mod app;
pub mod capabilities;
pub mod conversation;
pub mod event;
pub mod feed;
pub mod identity;
pub mod model;
pub mod session;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use app::{App, ViewModel};
pub use capabilities::{Capabilities, Effect};
pub use event::Event;
pub use model::Model;

/// Fixed browse page size, matching the production grid (2 columns x 3 rows).
pub const PAGE_SIZE: usize = 6;
/// Storage key for the persisted bearer token.
pub const TOKEN_STORAGE_KEY: &str = "session.token";
pub const MAX_DESCRIPTION_LENGTH: usize = 4096;
pub const MAX_MESSAGE_LENGTH: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Network,
    Timeout,
    Authentication,
    AccountNotActivated,
    Authorization,
    Validation,
    NotFound,
    Conflict,
    Storage,
    Serialization,
    Deserialization,
    InvalidState,
    Internal,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Authentication => "AUTH_ERROR",
            Self::AccountNotActivated => "ACCOUNT_NOT_ACTIVATED",
            Self::Authorization => "FORBIDDEN",
            Self::Validation => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::Storage => "STORAGE_ERROR",
            Self::Serialization => "SERIALIZATION_ERROR",
            Self::Deserialization => "DESERIALIZATION_ERROR",
            Self::InvalidState => "INVALID_STATE",
            Self::Internal => "INTERNAL_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::Network | Self::Timeout | Self::Conflict | Self::Storage => {
                ErrorSeverity::Transient
            }

            Self::Serialization
            | Self::Deserialization
            | Self::InvalidState
            | Self::Internal => ErrorSeverity::Fatal,

            Self::Authentication
            | Self::AccountNotActivated
            | Self::Authorization
            | Self::Validation
            | Self::NotFound
            | Self::Unknown => ErrorSeverity::Permanent,
        }
    }

    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::Storage | Self::Conflict
        )
    }

    #[must_use]
    pub const fn http_status_hint(self) -> Option<u16> {
        match self {
            Self::Validation => Some(400),
            Self::Authentication => Some(401),
            Self::AccountNotActivated | Self::Authorization => Some(403),
            Self::NotFound => Some(404),
            Self::Conflict => Some(409),
            Self::Internal => Some(500),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    pub internal_message: Option<String>,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            internal_message: None,
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable() && !matches!(self.severity, ErrorSeverity::Fatal)
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Network => {
                "Unable to reach the server. Please check your connection and try again.".into()
            }
            ErrorKind::Timeout => "The request timed out. Please try again.".into(),
            ErrorKind::Authentication => "You are not signed in. Please sign in again.".into(),
            ErrorKind::AccountNotActivated => {
                if self.message.is_empty() {
                    "Please activate your account via the link sent to your email.".into()
                } else {
                    self.message.clone()
                }
            }
            ErrorKind::Authorization => {
                "You don't have permission to perform this action.".into()
            }
            ErrorKind::Validation => self.message.clone(),
            ErrorKind::NotFound => "The requested item could not be found.".into(),
            ErrorKind::Conflict => {
                "This action conflicts with a recent change. Please refresh and try again.".into()
            }
            ErrorKind::Storage => "Unable to save data on this device.".into(),
            ErrorKind::Serialization | ErrorKind::Deserialization => {
                "A data error occurred. Please contact support if this persists.".into()
            }
            ErrorKind::InvalidState => "The app is in an invalid state. Please restart it.".into(),
            ErrorKind::Internal | ErrorKind::Unknown => {
                "An unexpected error occurred. Please try again.".into()
            }
        }
    }

    /// Builds an error from a non-success HTTP response, pulling the message
    /// out of the backend's `error`/`message` JSON fields when present.
    #[must_use]
    pub fn from_http_status(status: u16, body: &[u8]) -> Self {
        let kind = match status {
            400 => ErrorKind::Validation,
            401 => ErrorKind::Authentication,
            403 => ErrorKind::AccountNotActivated,
            404 => ErrorKind::NotFound,
            408 => ErrorKind::Timeout,
            409 => ErrorKind::Conflict,
            500..=599 => ErrorKind::Internal,
            _ => ErrorKind::Unknown,
        };

        let message = serde_json::from_slice::<ApiErrorBody>(body)
            .ok()
            .and_then(ApiErrorBody::into_message)
            .or_else(|| {
                let text = String::from_utf8_lossy(body).trim().to_string();
                if text.is_empty() {
                    None
                } else {
                    Some(text)
                }
            })
            .unwrap_or_else(|| format!("HTTP error: {status}"));

        Self::new(kind, message).with_context("http_status", status.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

/// The backend is inconsistent about its error envelope: auth endpoints use
/// `error`, profile endpoints use `message`. Accept both.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ApiErrorBody {
    fn into_message(self) -> Option<String> {
        self.error.or(self.message).filter(|m| !m.is_empty())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[must_use]
pub fn current_time_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Relative age label for listing cards and messages, coarsening with
/// distance (seconds up to years, since listings stay up indefinitely).
#[must_use]
pub fn format_time_ago(timestamp_ms: u64, now_ms: u64) -> String {
    const MINUTE: u64 = 60;
    const HOUR: u64 = 60 * MINUTE;
    const DAY: u64 = 24 * HOUR;
    const BUCKETS: [(u64, u64, &str); 6] = [
        (MINUTE, 1, "s"),
        (HOUR, MINUTE, "m"),
        (DAY, HOUR, "h"),
        (7 * DAY, DAY, "d"),
        (30 * DAY, 7 * DAY, "w"),
        (365 * DAY, 30 * DAY, "mo"),
    ];

    let elapsed_secs = now_ms.saturating_sub(timestamp_ms) / 1000;
    if elapsed_secs < 5 {
        // Covers clock skew too: future timestamps read as "Just now".
        return "Just now".into();
    }

    for (limit, unit_secs, unit) in BUCKETS {
        if elapsed_secs < limit {
            return format!("{}{unit} ago", elapsed_secs / unit_secs);
        }
    }
    format!("{}y ago", elapsed_secs / (365 * DAY))
}
