use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;

/// Everything that can end a single attempt, or a whole logical operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("Invalid request: {message}")]
    Validation { message: String },

    #[error("Upstream error ({status}): {message}")]
    UpstreamHttp { status: StatusCode, message: String },

    #[error("Upstream response did not contain an image URL: {message}")]
    UpstreamShape { message: String },

    #[error("Attempt timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Generation was cancelled")]
    Cancelled,

    #[error("Generation aborted: {message}")]
    Internal { message: String },
}

/// Coarse failure classification handed to the frontend.
#[derive(Debug, Clone, Copy, Display, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    UpstreamHttp,
    UpstreamShape,
    Timeout,
    Network,
    Cancelled,
    Internal,
}

impl GenerationError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::Validation { .. } | Self::Cancelled | Self::Internal { .. }
        )
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Validation { .. } => FailureKind::Validation,
            Self::UpstreamHttp { .. } => FailureKind::UpstreamHttp,
            Self::UpstreamShape { .. } => FailureKind::UpstreamShape,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::Network { .. } => FailureKind::Network,
            Self::Cancelled => FailureKind::Cancelled,
            Self::Internal { .. } => FailureKind::Internal,
        }
    }
}
