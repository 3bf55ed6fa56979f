use std::sync::Arc;

use tracing::info;

use super::ensure_positive_amount;
use crate::{
    error::{PhaJayError, Result},
    http::HttpClient,
    types::{PaymentQrRequest, PaymentQrResponse},
};

/// Generates bank-specific payment QR codes
///
/// The returned `transaction_id` is what a
/// [`SubscriptionService`](crate::SubscriptionService) watches.
#[derive(Debug, Clone)]
pub struct PaymentQrService {
    http: Arc<HttpClient>,
}

impl PaymentQrService {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }

    pub async fn generate_qr(&self, request: &PaymentQrRequest) -> Result<PaymentQrResponse> {
        let bank = request
            .bank
            .ok_or_else(|| PhaJayError::InvalidRequest("Bank is required".to_string()))?;
        ensure_positive_amount(request.amount)?;

        let response: PaymentQrResponse = self.http.post(&bank.qr_path(), request).await?;
        info!(
            bank = %bank,
            amount = request.amount,
            transaction_id = %response.transaction_id,
            "Payment QR generated"
        );
        Ok(response)
    }
}
