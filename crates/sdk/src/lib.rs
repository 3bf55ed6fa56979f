//! PhaJay SDK
//!
//! Client library for the PhaJay payment gateway (Laos). It wraps the
//! gateway's REST API and its real-time payment status channel.
//!
//! # Overview
//!
//! - [`PhaJayClient`] - Entry point holding credentials and the shared HTTP client
//! - [`PaymentLinkService`] - Hosted payment-page links
//! - [`PaymentQrService`] - Bank QR codes (BCEL, JDB, LDB, IB, STB)
//! - [`CreditCardService`] - Card payment pages
//! - [`SubscriptionService`] - Real-time watch of one transaction's outcome
//!
//! # Quick Start
//!
//! ## Generating a QR code and waiting for the payment
//!
//! ```ignore
//! use phajay_sdk::{ClientConfig, PaymentQrRequest, PhaJayClient, SupportedBank, WatchOutcome};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = PhaJayClient::new(ClientConfig::new("your-secret-key"))?;
//!
//!     let qr = client
//!         .payment_qr()
//!         .generate_qr(&PaymentQrRequest::new(SupportedBank::Bcel, 10_000))
//!         .await?;
//!     println!("Scan: {}", qr.qr_code);
//!
//!     match client.watch(&qr.transaction_id).watch().await? {
//!         WatchOutcome::Received(event) => println!("Paid: {}", event.transaction_id),
//!         WatchOutcome::Failed(event) => println!("Failed: {}", event.transaction_id),
//!         WatchOutcome::TimedOut(_) => println!("No confirmation received"),
//!         WatchOutcome::Cancelled => {}
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Callback style
//!
//! ```ignore
//! use phajay_sdk::SubscriptionService;
//!
//! let config = client
//!     .subscription("TX1")
//!     .on_connect(|| println!("listening"))
//!     .on_payment_received(|event| println!("paid: {:?}", event.payload))
//!     .on_error(|error| eprintln!("error: {}", error))
//!     .on_disconnect(|| println!("done"));
//!
//! let subscription = SubscriptionService::new(config);
//! subscription.connect().await?;
//! // ...
//! subscription.disconnect();
//! ```
//!
//! # Fallback timeout
//!
//! When no terminal event arrives within the fallback timeout (10 seconds by
//! default) after connecting, the subscription reports a synthesized success
//! with [`PaymentEvent::synthesized`] set. Treat such events as unconfirmed.

pub mod channel;
pub mod client;
pub mod error;
pub mod http;
pub mod listeners;
pub mod payments;
pub mod subscription;
pub mod transport;
pub mod types;

// Re-export main types at crate root
pub use channel::{ChannelEventKind, ChannelListeners, ChannelSignal};
pub use client::PhaJayClient;
pub use error::{ApiError, ApiErrorCode, PhaJayError, Result};
pub use http::HttpClient;
pub use listeners::{Listener, ListenerRegistry};
pub use payments::{CreditCardService, PaymentLinkService, PaymentQrService};
pub use subscription::{SubscriptionConfig, SubscriptionService};
pub use transport::{ChannelStream, ChannelTarget, ChannelTransport, SseTransport};
pub use types::{
    ClientConfig, CreditCardRequest, CreditCardResponse, PaymentEvent, PaymentLinkRequest,
    PaymentLinkResponse, PaymentQrRequest, PaymentQrResponse, PaymentStatus, SubscriptionState,
    SupportedBank, Tags, Termination, WatchOutcome, defaults,
};
