use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Status carried by a real-time payment event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[serde(alias = "SUCCESS", alias = "PAYMENT_COMPLETED")]
    Success,
    #[serde(alias = "FAILED", alias = "PAYMENT_FAILED")]
    Failed,
    #[serde(alias = "PENDING")]
    Pending,
}

impl PaymentStatus {
    /// Whether this status ends the watch of a transaction
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Success | PaymentStatus::Failed)
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Success => write!(f, "success"),
            PaymentStatus::Failed => write!(f, "failed"),
            PaymentStatus::Pending => write!(f, "pending"),
        }
    }
}

/// Payment status update pushed on the real-time channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEvent {
    pub transaction_id: String,

    pub status: PaymentStatus,

    /// Gateway-specific details (amount, payer bank, tags...)
    #[serde(default)]
    pub payload: serde_json::Value,

    /// Set when the event was produced locally by the timeout fallback
    /// instead of being received from the gateway
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub synthesized: bool,
}

impl PaymentEvent {
    pub fn new(
        transaction_id: impl Into<String>,
        status: PaymentStatus,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            status,
            payload,
            synthesized: false,
        }
    }

    /// Success event produced when the channel stays silent past the fallback bound.
    /// This is not a confirmation from the gateway.
    pub fn fallback_success(transaction_id: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            status: PaymentStatus::Success,
            payload: serde_json::json!({ "reason": "fallback_timeout" }),
            synthesized: true,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
