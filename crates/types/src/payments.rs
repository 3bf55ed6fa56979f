use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

/// Banks that can issue a payment QR code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SupportedBank {
    Bcel,
    Jdb,
    Ldb,
    Ib,
    Stb,
}

impl SupportedBank {
    pub const ALL: [SupportedBank; 5] = [
        SupportedBank::Bcel,
        SupportedBank::Jdb,
        SupportedBank::Ldb,
        SupportedBank::Ib,
        SupportedBank::Stb,
    ];

    /// Bank code as used by the API (e.g. "BCEL")
    pub fn code(&self) -> &'static str {
        match self {
            SupportedBank::Bcel => "BCEL",
            SupportedBank::Jdb => "JDB",
            SupportedBank::Ldb => "LDB",
            SupportedBank::Ib => "IB",
            SupportedBank::Stb => "STB",
        }
    }

    /// Path of the QR generation endpoint for this bank, relative to the API base URL
    pub fn qr_path(&self) -> String {
        format!("/payment/generate-{}-qr", self.code().to_lowercase())
    }
}

impl Display for SupportedBank {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unsupported bank: {0}. Valid options are: BCEL, JDB, LDB, IB, STB")]
pub struct UnknownBankError(pub String);

impl FromStr for SupportedBank {
    type Err = UnknownBankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SupportedBank::ALL
            .into_iter()
            .find(|bank| bank.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownBankError(s.to_string()))
    }
}

/// Free-form tags attached to a payment, echoed back in status events
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tags {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag3: Option<String>,
}

/// Body of a payment link creation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLinkRequest {
    /// Amount in LAK
    pub amount: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Merchant order number, generated by the gateway when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_no: Option<String>,

    #[serde(flatten)]
    pub tags: Tags,
}

impl PaymentLinkRequest {
    pub fn new(amount: u64) -> Self {
        Self {
            amount,
            description: None,
            order_no: None,
            tags: Tags::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_order_no(mut self, order_no: impl Into<String>) -> Self {
        self.order_no = Some(order_no.into());
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentLinkResponse {
    #[serde(default)]
    pub message: String,

    /// Hosted payment page the payer should be redirected to
    #[serde(rename = "redirectURL")]
    pub redirect_url: String,
}

/// Body of a bank QR code generation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentQrRequest {
    /// Selects the endpoint, not sent in the body
    #[serde(skip)]
    pub bank: Option<SupportedBank>,

    /// Amount in LAK
    pub amount: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(flatten)]
    pub tags: Tags,
}

impl PaymentQrRequest {
    pub fn new(bank: SupportedBank, amount: u64) -> Self {
        Self {
            bank: Some(bank),
            amount,
            description: None,
            tags: Tags::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentQrResponse {
    #[serde(default)]
    pub message: String,

    /// Identifier to hand to the subscription service
    pub transaction_id: String,

    /// EMV QR payload to render
    pub qr_code: String,

    /// Deep link into the bank's mobile app
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// Body of a credit-card payment request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditCardRequest {
    /// Amount in LAK
    pub amount: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(flatten)]
    pub tags: Tags,
}

impl CreditCardRequest {
    pub fn new(amount: u64) -> Self {
        Self {
            amount,
            description: None,
            tags: Tags::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditCardResponse {
    #[serde(default)]
    pub message: String,

    /// Card payment page the payer should be redirected to
    pub payment_url: String,

    pub transaction_id: String,
}
