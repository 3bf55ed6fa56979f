use console::style;
use phajay_sdk::{
    CreditCardResponse, PaymentEvent, PaymentLinkResponse, PaymentQrResponse, SupportedBank,
    WatchOutcome,
};
use serde_json::{Value, json};

#[derive(Clone, Debug, PartialEq)]
pub enum OutputFormat {
    Json,
    Pretty,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "pretty" => Ok(OutputFormat::Pretty),
            _ => Err(format!(
                "Invalid format: {}. Valid options are: json, pretty",
                s
            )),
        }
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Failed to serialize output: {}", e))?;
    println!("{}", json);
    Ok(())
}

pub fn print_link(format: &OutputFormat, response: &PaymentLinkResponse) -> Result<(), String> {
    match format {
        OutputFormat::Json => print_json(response),
        OutputFormat::Pretty => {
            println!("\n✓ Payment link created\n");
            println!("  {} {}", style("URL:").bold(), style(&response.redirect_url).cyan());
            if !response.message.is_empty() {
                println!("  {} {}", style("Message:").bold(), response.message);
            }
            Ok(())
        }
    }
}

pub fn print_qr(
    format: &OutputFormat,
    bank: SupportedBank,
    response: &PaymentQrResponse,
) -> Result<(), String> {
    match format {
        OutputFormat::Json => print_json(response),
        OutputFormat::Pretty => {
            println!("\n✓ {} QR code generated\n", bank);
            println!(
                "  {} {}",
                style("Transaction:").bold(),
                style(&response.transaction_id).dim()
            );
            println!("  {} {}", style("QR code:").bold(), response.qr_code);
            if let Some(link) = &response.link {
                println!("  {} {}", style("App link:").bold(), style(link).cyan());
            }
            Ok(())
        }
    }
}

pub fn print_card(format: &OutputFormat, response: &CreditCardResponse) -> Result<(), String> {
    match format {
        OutputFormat::Json => print_json(response),
        OutputFormat::Pretty => {
            println!("\n✓ Card payment created\n");
            println!(
                "  {} {}",
                style("Transaction:").bold(),
                style(&response.transaction_id).dim()
            );
            println!("  {} {}", style("URL:").bold(), style(&response.payment_url).cyan());
            Ok(())
        }
    }
}

/// JSON shape of a watch outcome: `{"outcome": ..., "event": ...}`
pub fn outcome_json(outcome: &WatchOutcome) -> Value {
    let (name, event) = match outcome {
        WatchOutcome::Received(event) => ("received", Some(event)),
        WatchOutcome::Failed(event) => ("failed", Some(event)),
        WatchOutcome::TimedOut(event) => ("timed_out", Some(event)),
        WatchOutcome::Cancelled => ("cancelled", None),
    };
    json!({ "outcome": name, "event": event })
}

pub fn print_outcome(format: &OutputFormat, outcome: &WatchOutcome) -> Result<(), String> {
    match format {
        OutputFormat::Json => print_json(&outcome_json(outcome)),
        OutputFormat::Pretty => {
            match outcome {
                WatchOutcome::Received(event) => {
                    println!("\n{} Payment received\n", style("✓").green().bold());
                    print_event(event);
                }
                WatchOutcome::Failed(event) => {
                    println!("\n{} Payment failed\n", style("✗").red().bold());
                    print_event(event);
                }
                WatchOutcome::TimedOut(event) => {
                    println!(
                        "\n{} No payment event received before the timeout; reported as success without confirmation\n",
                        style("Warning:").yellow()
                    );
                    print_event(event);
                }
                WatchOutcome::Cancelled => {
                    println!("\nWatch cancelled");
                }
            }
            Ok(())
        }
    }
}

fn print_event(event: &PaymentEvent) {
    println!(
        "  {} {}",
        style("Transaction:").bold(),
        style(&event.transaction_id).dim()
    );
    println!("  {} {}", style("Status:").bold(), event.status);
    if !event.payload.is_null() {
        println!("  {} {}", style("Payload:").bold(), event.payload);
    }
}
