use std::sync::Arc;

use tracing::info;

use super::ensure_positive_amount;
use crate::{
    error::Result,
    http::HttpClient,
    types::{CreditCardRequest, CreditCardResponse},
};

const CREDIT_CARD_PATH: &str = "/jdb2c2p/payment/payment-link";

/// Creates credit-card payments on the gateway's card page
#[derive(Debug, Clone)]
pub struct CreditCardService {
    http: Arc<HttpClient>,
}

impl CreditCardService {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }

    pub async fn create_payment(&self, request: &CreditCardRequest) -> Result<CreditCardResponse> {
        ensure_positive_amount(request.amount)?;

        let response: CreditCardResponse = self.http.post(CREDIT_CARD_PATH, request).await?;
        info!(
            amount = request.amount,
            transaction_id = %response.transaction_id,
            "Credit card payment created"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    use super::*;
    use crate::{
        error::{ApiErrorCode, PhaJayError},
        types::ClientConfig,
    };

    async fn service_for(server: &MockServer) -> CreditCardService {
        let config = ClientConfig::new("secret").with_base_url(server.uri());
        CreditCardService::new(Arc::new(HttpClient::new(&config).unwrap()))
    }

    #[tokio::test]
    async fn test_create_payment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/jdb2c2p/payment/payment-link"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": "SUCCESSFULLY",
                "paymentUrl": "https://card.phajay.co/pay/xyz",
                "transactionId": "CC-1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = service_for(&server)
            .await
            .create_payment(&CreditCardRequest::new(500).with_description("Card test"))
            .await
            .unwrap();
        assert_eq!(response.payment_url, "https://card.phajay.co/pay/xyz");
        assert_eq!(response.transaction_id, "CC-1");
    }

    #[tokio::test]
    async fn test_create_payment_surfaces_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/jdb2c2p/payment/payment-link"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({ "message": "amount too small" })),
            )
            .mount(&server)
            .await;

        let result = service_for(&server)
            .await
            .create_payment(&CreditCardRequest::new(1))
            .await;
        match result {
            Err(PhaJayError::Api(error)) => {
                assert_eq!(error.code, ApiErrorCode::Status(400));
                assert_eq!(error.message, "amount too small");
            }
            other => panic!("expected API error, got {:?}", other),
        }
    }
}
