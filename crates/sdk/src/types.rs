use std::{env, time::Duration};

// Re-export shared types from phajay-types
pub use phajay_types::{
    CreditCardRequest, CreditCardResponse, PaymentEvent, PaymentLinkRequest, PaymentLinkResponse,
    PaymentQrRequest, PaymentQrResponse, PaymentStatus, SupportedBank, Tags, defaults,
};

use crate::error::{PhaJayError, Result};

/// Lifecycle state of a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Not connected; `connect()` may be called
    Idle,

    /// Channel handshake in progress
    Connecting,

    /// Channel open, waiting for a terminal event
    Connected,

    /// Absorbing state, no further callback fires
    Terminated(Termination),
}

/// How a subscription ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The gateway reported the payment as successful
    Success,
    /// The gateway reported the payment as failed
    Error,
    /// No terminal event arrived within the fallback bound
    Timeout,
    /// The caller disconnected
    Disconnected,
}

impl SubscriptionState {
    pub fn is_terminated(&self) -> bool {
        matches!(self, SubscriptionState::Terminated(_))
    }
}

impl std::fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionState::Idle => write!(f, "idle"),
            SubscriptionState::Connecting => write!(f, "connecting"),
            SubscriptionState::Connected => write!(f, "connected"),
            SubscriptionState::Terminated(Termination::Success) => write!(f, "terminated-success"),
            SubscriptionState::Terminated(Termination::Error) => write!(f, "terminated-error"),
            SubscriptionState::Terminated(Termination::Timeout) => write!(f, "terminated-timeout"),
            SubscriptionState::Terminated(Termination::Disconnected) => {
                write!(f, "terminated-disconnected")
            }
        }
    }
}

/// Result of watching one transaction
#[derive(Debug, Clone, PartialEq)]
pub enum WatchOutcome {
    /// The gateway confirmed the payment
    Received(PaymentEvent),

    /// The gateway reported the payment as failed
    Failed(PaymentEvent),

    /// The channel stayed silent past the fallback bound. The carried event is
    /// synthesized locally and does not prove that the payment settled.
    TimedOut(PaymentEvent),

    /// The caller disconnected before any outcome
    Cancelled,
}

impl WatchOutcome {
    pub fn event(&self) -> Option<&PaymentEvent> {
        match self {
            WatchOutcome::Received(event)
            | WatchOutcome::Failed(event)
            | WatchOutcome::TimedOut(event) => Some(event),
            WatchOutcome::Cancelled => None,
        }
    }
}

/// Configuration for [`PhaJayClient`](crate::PhaJayClient)
#[derive(Clone)]
pub struct ClientConfig {
    /// Merchant secret key, sent as `Basic base64(secret_key)`
    pub secret_key: String,

    /// Base URL for the REST API
    pub base_url: String,

    /// Base URL for the real-time payment channel
    pub channel_url: String,

    /// Timeout applied to every REST call
    pub request_timeout: Duration,

    /// How long a subscription waits for a terminal event before falling back
    pub fallback_timeout: Duration,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("secret_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("channel_url", &self.channel_url)
            .field("request_timeout", &self.request_timeout)
            .field("fallback_timeout", &self.fallback_timeout)
            .finish()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            base_url: defaults::BASE_URL.to_string(),
            channel_url: defaults::CHANNEL_URL.to_string(),
            request_timeout: Duration::from_secs(defaults::REQUEST_TIMEOUT_SECS),
            fallback_timeout: Duration::from_secs(defaults::FALLBACK_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with the given secret key
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            ..Default::default()
        }
    }

    /// Build a configuration from `PHAJAY_SECRET_KEY`, `PHAJAY_BASE_URL` and `PHAJAY_CHANNEL_URL`
    pub fn from_env() -> Result<Self> {
        let secret_key = env::var(phajay_types::env::SECRET_KEY).map_err(|_| {
            PhaJayError::Configuration(format!(
                "{} environment variable is not set",
                phajay_types::env::SECRET_KEY
            ))
        })?;

        let mut config = Self::new(secret_key);
        if let Ok(base_url) = env::var(phajay_types::env::BASE_URL) {
            config.base_url = base_url;
        }
        if let Ok(channel_url) = env::var(phajay_types::env::CHANNEL_URL) {
            config.channel_url = channel_url;
        }
        Ok(config)
    }

    /// Set the REST API base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the real-time channel base URL
    pub fn with_channel_url(mut self, channel_url: impl Into<String>) -> Self {
        self.channel_url = channel_url.into();
        self
    }

    /// Set the REST request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the subscription fallback timeout
    pub fn with_fallback_timeout(mut self, timeout: Duration) -> Self {
        self.fallback_timeout = timeout;
        self
    }
}
