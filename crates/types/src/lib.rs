//! Wire types shared by the PhaJay SDK and CLI.
//!
//! Request and response bodies of the payment API live in [`payments`], the
//! real-time payment status messages in [`events`].

pub mod events;
pub mod payments;

pub use events::{PaymentEvent, PaymentStatus};
pub use payments::{
    CreditCardRequest, CreditCardResponse, PaymentLinkRequest, PaymentLinkResponse,
    PaymentQrRequest, PaymentQrResponse, SupportedBank, Tags, UnknownBankError,
};

/// Default values used across the SDK
pub mod defaults {
    /// Base URL of the PhaJay REST API
    pub const BASE_URL: &str = "https://payment-gateway.phajay.co/v1/api";

    /// Base URL of the real-time payment channel
    pub const CHANNEL_URL: &str = "https://payment-gateway.phajay.co";

    /// HTTP request timeout, in seconds
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;

    /// Time to wait for a terminal payment event before falling back, in seconds
    pub const FALLBACK_TIMEOUT_SECS: u64 = 10;
}

/// Environment variable names understood by the SDK and CLI
pub mod env {
    pub const SECRET_KEY: &str = "PHAJAY_SECRET_KEY";
    pub const BASE_URL: &str = "PHAJAY_BASE_URL";
    pub const CHANNEL_URL: &str = "PHAJAY_CHANNEL_URL";
}
