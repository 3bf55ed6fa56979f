use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, stream::BoxStream};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest_eventsource::{Event as SseEvent, EventSource, retry};
use tracing::{debug, warn};
use url::Url;

use crate::{
    error::{PhaJayError, Result},
    http::basic_authorization,
    types::{PaymentEvent, defaults},
};

/// Inbound payment events of an open channel. An `Err` item ends the stream.
pub type ChannelStream = BoxStream<'static, Result<PaymentEvent>>;

/// Where and how to open the real-time channel for one transaction
#[derive(Clone)]
pub struct ChannelTarget {
    /// Subscription endpoint, scoped to the watched transaction
    pub url: Url,

    /// `Authorization` header value, same credential as the REST API
    pub authorization: String,

    pub transaction_id: String,
}

impl std::fmt::Debug for ChannelTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelTarget")
            .field("url", &self.url.as_str())
            .field("transaction_id", &self.transaction_id)
            .finish_non_exhaustive()
    }
}

impl ChannelTarget {
    /// Validate the settings and build `<channel_url>/subscriptions/<transaction_id>`
    pub fn new(channel_url: &str, secret_key: &str, transaction_id: &str) -> Result<Self> {
        if secret_key.trim().is_empty() {
            return Err(PhaJayError::Configuration(
                "Secret key is required to subscribe".to_string(),
            ));
        }
        if transaction_id.trim().is_empty() {
            return Err(PhaJayError::Configuration(
                "Transaction ID is required to subscribe".to_string(),
            ));
        }

        let mut url = Url::parse(channel_url).map_err(|e| {
            PhaJayError::Configuration(format!("Invalid channel URL '{}': {}", channel_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                PhaJayError::Configuration(format!(
                    "Channel URL '{}' cannot be a base URL",
                    channel_url
                ))
            })?
            .pop_if_empty()
            .push("subscriptions")
            .push(transaction_id);

        Ok(Self {
            url,
            authorization: basic_authorization(secret_key),
            transaction_id: transaction_id.to_string(),
        })
    }
}

/// Opens the real-time payment channel
///
/// `open` resolves once the handshake completed; the returned stream yields
/// the events pushed for the target transaction.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    async fn open(&self, target: &ChannelTarget) -> Result<ChannelStream>;
}

/// Server-Sent Events transport
///
/// The event source never reconnects on its own; reconnecting is the
/// caller's decision. The handshake (request sent until the stream opens)
/// is bounded by `handshake_timeout`.
#[derive(Debug, Clone)]
pub struct SseTransport {
    client: reqwest::Client,
    handshake_timeout: Duration,
}

impl Default for SseTransport {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
            handshake_timeout: Duration::from_secs(defaults::REQUEST_TIMEOUT_SECS),
        }
    }
}

impl SseTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Set how long `open` waits for the channel to open
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }
}

#[async_trait]
impl ChannelTransport for SseTransport {
    async fn open(&self, target: &ChannelTarget) -> Result<ChannelStream> {
        let request = self
            .client
            .get(target.url.clone())
            .header(AUTHORIZATION, &target.authorization)
            .header(ACCEPT, "text/event-stream");

        let mut es = EventSource::new(request)
            .map_err(|e| PhaJayError::Connection(format!("Failed to create event source: {}", e)))?;
        es.set_retry_policy(Box::new(retry::Never));

        // Wait for the handshake so that connect() only resolves on an open channel
        let first = match tokio::time::timeout(self.handshake_timeout, es.next()).await {
            Ok(first) => first,
            Err(_) => {
                es.close();
                return Err(PhaJayError::Connection(format!(
                    "Channel handshake timed out after {:?}",
                    self.handshake_timeout
                )));
            }
        };
        let early = match first {
            Some(Ok(SseEvent::Open)) => None,
            Some(Ok(SseEvent::Message(msg))) => Some(msg),
            Some(Err(e)) => {
                es.close();
                return Err(PhaJayError::Connection(e.to_string()));
            }
            None => {
                return Err(PhaJayError::Connection(
                    "Channel closed during handshake".to_string(),
                ));
            }
        };
        debug!(transaction_id = %target.transaction_id, "SSE connection opened");

        let transaction_id = target.transaction_id.clone();
        let stream = async_stream::stream! {
            if let Some(msg) = early {
                if let Some(event) = parse_message(&transaction_id, &msg.data) {
                    yield Ok(event);
                }
            }

            loop {
                match es.next().await {
                    Some(Ok(SseEvent::Open)) => {
                        debug!(transaction_id = %transaction_id, "SSE connection reopened");
                    }
                    Some(Ok(SseEvent::Message(msg))) => {
                        if let Some(event) = parse_message(&transaction_id, &msg.data) {
                            yield Ok(event);
                        }
                    }
                    Some(Err(e)) => {
                        es.close();
                        yield Err(PhaJayError::ConnectionLost(e.to_string()));
                        break;
                    }
                    None => {
                        yield Err(PhaJayError::ConnectionLost("SSE stream ended".to_string()));
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

fn parse_message(transaction_id: &str, data: &str) -> Option<PaymentEvent> {
    match serde_json::from_str::<PaymentEvent>(data) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(
                transaction_id = %transaction_id,
                error = %e,
                data = %data,
                "Failed to parse payment event"
            );
            None
        }
    }
}
