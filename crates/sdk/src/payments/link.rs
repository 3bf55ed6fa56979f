use std::sync::Arc;

use tracing::info;

use super::ensure_positive_amount;
use crate::{
    error::Result,
    http::HttpClient,
    types::{PaymentLinkRequest, PaymentLinkResponse},
};

const PAYMENT_LINK_PATH: &str = "/link/payment-link";

/// Creates hosted payment-page links
#[derive(Debug, Clone)]
pub struct PaymentLinkService {
    http: Arc<HttpClient>,
}

impl PaymentLinkService {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }

    /// Create a payment link; the payer completes the payment on `redirect_url`
    pub async fn create_payment_link(
        &self,
        request: &PaymentLinkRequest,
    ) -> Result<PaymentLinkResponse> {
        ensure_positive_amount(request.amount)?;

        let response: PaymentLinkResponse = self.http.post(PAYMENT_LINK_PATH, request).await?;
        info!(
            amount = request.amount,
            order_no = ?request.order_no,
            redirect_url = %response.redirect_url,
            "Payment link created"
        );
        Ok(response)
    }
}
