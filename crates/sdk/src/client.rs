use std::sync::Arc;

use tracing::debug;

use crate::{
    error::Result,
    http::HttpClient,
    payments::{CreditCardService, PaymentLinkService, PaymentQrService},
    subscription::{SubscriptionConfig, SubscriptionService},
    transport::SseTransport,
    types::ClientConfig,
};

/// Entry point of the SDK
///
/// Holds one authenticated [`HttpClient`] shared by the payment services, and
/// the settings used to open transaction subscriptions.
#[derive(Debug, Clone)]
pub struct PhaJayClient {
    config: ClientConfig,
    payment_link: PaymentLinkService,
    payment_qr: PaymentQrService,
    credit_card: CreditCardService,
}

impl PhaJayClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = Arc::new(HttpClient::new(&config)?);
        debug!(
            base_url = %http.base_url(),
            channel_url = %config.channel_url,
            "PhaJay client created"
        );

        Ok(Self {
            payment_link: PaymentLinkService::new(Arc::clone(&http)),
            payment_qr: PaymentQrService::new(Arc::clone(&http)),
            credit_card: CreditCardService::new(http),
            config,
        })
    }

    /// Create a client from `PHAJAY_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn payment_link(&self) -> &PaymentLinkService {
        &self.payment_link
    }

    pub fn payment_qr(&self) -> &PaymentQrService {
        &self.payment_qr
    }

    pub fn credit_card(&self) -> &CreditCardService {
        &self.credit_card
    }

    /// Subscription settings for `transaction_id`, pre-filled from this client
    ///
    /// Attach callbacks on the returned config, then hand it to
    /// [`subscribe`](Self::subscribe), or use [`watch`](Self::watch).
    pub fn subscription(&self, transaction_id: impl Into<String>) -> SubscriptionConfig {
        SubscriptionConfig::new(
            self.config.channel_url.clone(),
            self.config.secret_key.clone(),
            transaction_id,
        )
        .with_fallback_timeout(self.config.fallback_timeout)
    }

    /// Create a subscription service for `transaction_id` without callbacks
    ///
    /// The channel handshake is bounded by the client's request timeout.
    pub fn watch(&self, transaction_id: impl Into<String>) -> SubscriptionService {
        self.subscribe(self.subscription(transaction_id))
    }

    /// Create a subscription service from `config` over this client's channel settings
    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionService {
        let transport = SseTransport::new().with_handshake_timeout(self.config.request_timeout);
        SubscriptionService::with_transport(config, Arc::new(transport))
    }
}
