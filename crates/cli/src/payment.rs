use phajay_sdk::{CreditCardRequest, PaymentLinkRequest, PaymentQrRequest, SupportedBank, Tags};
use tracing::info;

use crate::{Context, output, watch};

/// Free-form tags echoed back by the gateway in payment events
#[derive(Debug, Clone, PartialEq, Default, clap::Args)]
pub struct TagArgs {
    #[arg(long = "tag1")]
    pub tag1: Option<String>,

    #[arg(long = "tag2")]
    pub tag2: Option<String>,

    #[arg(long = "tag3")]
    pub tag3: Option<String>,
}

impl From<TagArgs> for Tags {
    fn from(args: TagArgs) -> Self {
        Tags {
            tag1: args.tag1,
            tag2: args.tag2,
            tag3: args.tag3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, clap::Args)]
pub struct LinkCommand {
    /// Amount in LAK
    #[arg(long = "amount", short = 'a')]
    pub amount: u64,

    #[arg(long = "description", short = 'd')]
    pub description: Option<String>,

    /// Merchant order number (generated by the gateway when omitted)
    #[arg(long = "order-no")]
    pub order_no: Option<String>,

    #[clap(flatten)]
    pub tags: TagArgs,
}

impl LinkCommand {
    fn request(&self) -> PaymentLinkRequest {
        let mut request = PaymentLinkRequest::new(self.amount).with_tags(self.tags.clone().into());
        if let Some(description) = &self.description {
            request = request.with_description(description);
        }
        if let Some(order_no) = &self.order_no {
            request = request.with_order_no(order_no);
        }
        request
    }

    pub async fn execute(&self, ctx: &Context) -> Result<(), String> {
        let response = ctx
            .client
            .payment_link()
            .create_payment_link(&self.request())
            .await
            .map_err(|e| e.to_string())?;

        output::print_link(&ctx.format, &response)
    }
}

#[derive(Debug, Clone, PartialEq, clap::Args)]
pub struct QrCommand {
    /// Bank issuing the QR code: BCEL, JDB, LDB, IB or STB
    #[arg(long = "bank", short = 'b')]
    pub bank: SupportedBank,

    /// Amount in LAK
    #[arg(long = "amount", short = 'a')]
    pub amount: u64,

    #[arg(long = "description", short = 'd')]
    pub description: Option<String>,

    /// Keep watching the generated transaction until it completes
    #[arg(long = "watch", short = 'w', default_value = "false")]
    pub watch: bool,

    #[clap(flatten)]
    pub tags: TagArgs,
}

impl QrCommand {
    fn request(&self) -> PaymentQrRequest {
        let mut request =
            PaymentQrRequest::new(self.bank, self.amount).with_tags(self.tags.clone().into());
        if let Some(description) = &self.description {
            request = request.with_description(description);
        }
        request
    }

    pub async fn execute(&self, ctx: &Context) -> Result<(), String> {
        let response = ctx
            .client
            .payment_qr()
            .generate_qr(&self.request())
            .await
            .map_err(|e| e.to_string())?;

        output::print_qr(&ctx.format, self.bank, &response)?;

        if self.watch {
            info!(transaction_id = %response.transaction_id, "Watching generated transaction");
            watch::watch_transaction(ctx, &response.transaction_id, None).await?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, clap::Args)]
pub struct CardCommand {
    /// Amount in LAK
    #[arg(long = "amount", short = 'a')]
    pub amount: u64,

    #[arg(long = "description", short = 'd')]
    pub description: Option<String>,

    #[clap(flatten)]
    pub tags: TagArgs,
}

impl CardCommand {
    fn request(&self) -> CreditCardRequest {
        let mut request = CreditCardRequest::new(self.amount).with_tags(self.tags.clone().into());
        if let Some(description) = &self.description {
            request = request.with_description(description);
        }
        request
    }

    pub async fn execute(&self, ctx: &Context) -> Result<(), String> {
        let response = ctx
            .client
            .credit_card()
            .create_payment(&self.request())
            .await
            .map_err(|e| e.to_string())?;

        output::print_card(&ctx.format, &response)
    }
}
