//! Request/response payment operations
//!
//! Each service issues a single authenticated call through the shared
//! [`HttpClient`](crate::http::HttpClient). Amounts are validated locally so
//! an obviously invalid request never reaches the gateway.

mod credit_card;
mod link;
mod qr;

pub use credit_card::CreditCardService;
pub use link::PaymentLinkService;
pub use qr::PaymentQrService;

use crate::error::{PhaJayError, Result};

fn ensure_positive_amount(amount: u64) -> Result<()> {
    if amount == 0 {
        return Err(PhaJayError::InvalidRequest(
            "Amount must be greater than zero".to_string(),
        ));
    }
    Ok(())
}
