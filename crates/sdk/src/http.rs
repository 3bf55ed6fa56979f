use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::{
    Method,
    header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    error::{ApiError, ApiErrorCode, PhaJayError, Result},
    types::ClientConfig,
};

/// `Authorization` header value derived from a merchant secret key
pub fn basic_authorization(secret_key: &str) -> String {
    format!("Basic {}", STANDARD.encode(secret_key))
}

/// Authenticated JSON client for the PhaJay REST API
///
/// Every request carries `Authorization: Basic <base64(secret)>` and
/// `Content-Type: application/json`, and is bounded by the configured
/// request timeout. Failures are mapped to [`ApiError`].
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        if config.secret_key.trim().is_empty() {
            return Err(PhaJayError::Configuration(
                "Secret key is required".to_string(),
            ));
        }

        let authorization = HeaderValue::from_str(&basic_authorization(&config.secret_key))
            .map_err(|e| PhaJayError::Configuration(format!("Invalid secret key: {}", e)))?;

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, authorization);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                PhaJayError::Configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request::<T, ()>(Method::GET, path, None).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.request(Method::POST, path, Some(body)).await
    }

    /// Issue one request and decode the JSON response
    pub async fn request<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T> {
        let url = self.build_url(path);
        debug!(method = %method, url = %url, "Sending API request");

        let mut builder = self.client.request(method.clone(), &url);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = status_error(status, &body);
            warn!(
                method = %method,
                url = %url,
                code = %error.code,
                message = %error.message,
                "API request failed"
            );
            return Err(error.into());
        }

        response
            .json::<T>()
            .await
            .map_err(classify_transport_error)
    }
}

/// Error for a response that arrived with a non-success status
fn status_error(status: reqwest::StatusCode, body: &str) -> ApiError {
    let details = serde_json::from_str::<Value>(body)
        .ok()
        .or_else(|| (!body.is_empty()).then(|| Value::String(body.to_string())));

    let message = details
        .as_ref()
        .and_then(|d| d.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });

    ApiError {
        code: ApiErrorCode::Status(status.as_u16()),
        message,
        details,
    }
}

/// Map a reqwest failure where no usable response was obtained
fn classify_transport_error(error: reqwest::Error) -> PhaJayError {
    if error.is_connect() || error.is_timeout() || error.is_request() {
        ApiError::network().into()
    } else {
        ApiError::unknown(error.to_string()).into()
    }
}
