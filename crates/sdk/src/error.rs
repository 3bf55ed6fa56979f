use std::fmt::{self, Display, Formatter};

use phajay_types::PaymentEvent;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a failed API call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiErrorCode {
    /// The gateway answered with a non-success HTTP status
    Status(u16),
    /// No response was received (connection refused, DNS failure, timeout)
    Network,
    /// Anything else, e.g. a response body that could not be decoded
    Unknown,
}

impl ApiErrorCode {
    pub const NETWORK_ERROR: &'static str = "NETWORK_ERROR";
    pub const UNKNOWN_ERROR: &'static str = "UNKNOWN_ERROR";
}

impl Display for ApiErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ApiErrorCode::Status(status) => write!(f, "{}", status),
            ApiErrorCode::Network => f.write_str(Self::NETWORK_ERROR),
            ApiErrorCode::Unknown => f.write_str(Self::UNKNOWN_ERROR),
        }
    }
}

impl Serialize for ApiErrorCode {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ApiErrorCode {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Ok(match code.as_str() {
            Self::NETWORK_ERROR => ApiErrorCode::Network,
            other => other
                .parse::<u16>()
                .map(ApiErrorCode::Status)
                .unwrap_or(ApiErrorCode::Unknown),
        })
    }
}

/// Error surfaced by the REST API wrapper: `{code, message, details}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("[{code}] {message}")]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn network() -> Self {
        Self {
            code: ApiErrorCode::Network,
            message: "Network error occurred".to_string(),
            details: None,
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self {
            code: ApiErrorCode::Unknown,
            message: message.into(),
            details: None,
        }
    }

    /// HTTP status of the failed call, if the gateway answered at all
    pub fn status(&self) -> Option<u16> {
        match self.code {
            ApiErrorCode::Status(status) => Some(status),
            _ => None,
        }
    }
}

/// Errors that can occur in the PhaJay SDK
#[derive(Error, Debug)]
pub enum PhaJayError {
    /// The REST API call failed
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// A required setting is missing or malformed; nothing was attempted
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A request was rejected locally before being sent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The real-time channel could not be opened
    #[error("Connection error: {0}")]
    Connection(String),

    /// The real-time channel dropped while watching a transaction
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// The gateway reported the watched payment as failed
    #[error("Payment failed for transaction {}", .0.transaction_id)]
    PaymentFailed(PaymentEvent),

    /// The subscription already reached a terminal state
    #[error("Subscription closed")]
    SubscriptionClosed,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for SDK operations
pub type Result<T> = std::result::Result<T, PhaJayError>;
