use std::time::Duration;

use phajay_sdk::WatchOutcome;
use tracing::info;

use crate::{Context, output, output::OutputFormat};

#[derive(Debug, Clone, PartialEq, clap::Args)]
pub struct WatchCommand {
    /// Transaction to watch, as returned by `qr` or `card`
    pub transaction_id: String,

    /// Seconds to wait for a payment event before reporting the fallback success
    #[arg(long = "timeout-secs", short = 't')]
    pub timeout_secs: Option<u64>,
}

impl WatchCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<(), String> {
        watch_transaction(
            ctx,
            &self.transaction_id,
            self.timeout_secs.map(Duration::from_secs),
        )
        .await
    }
}

/// Watch one transaction until its outcome is known or Ctrl-C is pressed
pub async fn watch_transaction(
    ctx: &Context,
    transaction_id: &str,
    timeout: Option<Duration>,
) -> Result<(), String> {
    let mut config = ctx.client.subscription(transaction_id);
    if let Some(timeout) = timeout {
        config = config.with_fallback_timeout(timeout);
    }
    if ctx.format == OutputFormat::Pretty {
        let transaction_id = transaction_id.to_string();
        config = config.on_connect(move || {
            eprintln!("… Waiting for payment on {} (Ctrl-C to stop)", transaction_id);
        });
    }

    let subscription = ctx.client.subscribe(config);
    let outcome = tokio::select! {
        outcome = subscription.watch() => outcome.map_err(|e| e.to_string())?,
        _ = tokio::signal::ctrl_c() => {
            info!(transaction_id = %transaction_id, "Interrupted, disconnecting");
            subscription.disconnect();
            WatchOutcome::Cancelled
        }
    };

    output::print_outcome(&ctx.format, &outcome)?;

    match outcome {
        WatchOutcome::Failed(event) => Err(format!(
            "Payment failed for transaction {}",
            event.transaction_id
        )),
        _ => Ok(()),
    }
}
