use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::warn;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("malformed time value: {value}")]
    BadTimeFormat {
        value: String,
        details: Option<JsonValue>,
    },

    #[error("validation failed: {message}")]
    Validation {
        message: String,
        details: Option<JsonValue>,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl AppError {
    pub fn bad_time_format(value: impl Into<String>) -> Self {
        let value = value.into();
        warn!(target: "core::time", %value, "rejected malformed time string");
        AppError::BadTimeFormat {
            value,
            details: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "core::validation", %message, "validation error");
        AppError::Validation {
            message,
            details: None,
        }
    }

    pub fn validation_with_details(message: impl Into<String>, details: JsonValue) -> Self {
        let message = message.into();
        warn!(target: "core::validation", %message, details = %details, "validation error with details");
        AppError::Validation {
            message,
            details: Some(details),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "core::other", %message, "unclassified error");
        AppError::Other(message)
    }
}
