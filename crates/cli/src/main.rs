use std::{
    env,
    path::{Path, PathBuf},
    process,
};

use clap::{Parser, Subcommand};
use phajay_sdk::{ClientConfig, PhaJayClient};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod output;
mod payment;
mod watch;

use output::OutputFormat;

#[derive(Clone, Debug)]
pub struct Context {
    pub client: PhaJayClient,
    pub format: OutputFormat,
}

impl Context {
    pub fn new(client: PhaJayClient, format: OutputFormat) -> Self {
        Context { client, format }
    }
}

#[derive(Parser, Debug)]
#[clap(author, version, about = "PhaJay - Payment gateway CLI", long_about = None)]
struct Opts {
    /// Merchant secret key
    #[arg(long = "secret-key", short = 'k', global = true, env = "PHAJAY_SECRET_KEY", hide_env_values = true)]
    secret_key: Option<String>,

    /// REST API base URL (default: https://payment-gateway.phajay.co/v1/api)
    #[arg(long = "base-url", global = true, env = "PHAJAY_BASE_URL")]
    base_url: Option<String>,

    /// Real-time channel base URL (default: https://payment-gateway.phajay.co)
    #[arg(long = "channel-url", global = true, env = "PHAJAY_CHANNEL_URL")]
    channel_url: Option<String>,

    /// Path to a .env file to load before resolving settings
    #[arg(long = "env-file", global = true, default_value = "./.env")]
    env_file: PathBuf,

    /// Output format: json or pretty
    #[arg(long = "format", short = 'f', global = true, default_value = "pretty")]
    format: OutputFormat,

    /// Log SDK activity to stderr
    #[arg(long = "verbose", short = 'v', global = true, default_value = "false")]
    verbose: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
enum Command {
    /// Create a hosted payment link
    Link(payment::LinkCommand),
    /// Generate a bank QR code
    Qr(payment::QrCommand),
    /// Create a credit-card payment page
    Card(payment::CardCommand),
    /// Watch a transaction until it is paid, fails or times out
    Watch(watch::WatchCommand),
}

#[tokio::main]
async fn main() {
    let opts: Opts = match Opts::try_parse() {
        Ok(opts) => opts,
        Err(e) => {
            let _ = e.print();
            process::exit(e.exit_code());
        }
    };

    init_tracing(opts.verbose);
    load_env_file(&opts.env_file);

    let client = match build_client(&opts) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    let ctx = Context::new(client, opts.format.clone());

    if let Err(e) = handle_command(opts.command, &ctx).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Load environment variables from a .env file, if present
fn load_env_file(env_file_path: &Path) {
    match dotenvy::from_path(env_file_path) {
        Ok(_) => {
            eprintln!("✓ Loaded environment from {}", env_file_path.display());
        }
        Err(e) if e.not_found() => {
            // .env file not found is fine, just continue silently
        }
        Err(e) => {
            eprintln!(
                "Warning: Failed to load .env file at {}: {}",
                env_file_path.display(),
                e
            );
        }
    }
}

/// Resolve settings from flags first, then from the environment (including the .env file)
fn resolve_config(opts: &Opts) -> Result<ClientConfig, String> {
    let setting = |flag: &Option<String>, var: &str| flag.clone().or_else(|| env::var(var).ok());

    let secret_key = setting(&opts.secret_key, phajay_types::env::SECRET_KEY)
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| {
            format!(
                "Missing secret key: pass --secret-key or set {}",
                phajay_types::env::SECRET_KEY
            )
        })?;

    let mut config = ClientConfig::new(secret_key);
    if let Some(base_url) = setting(&opts.base_url, phajay_types::env::BASE_URL) {
        config = config.with_base_url(base_url);
    }
    if let Some(channel_url) = setting(&opts.channel_url, phajay_types::env::CHANNEL_URL) {
        config = config.with_channel_url(channel_url);
    }
    Ok(config)
}

fn build_client(opts: &Opts) -> Result<PhaJayClient, String> {
    let config = resolve_config(opts)?;
    debug!(config = ?config, "Resolved client configuration");
    PhaJayClient::new(config).map_err(|e| e.to_string())
}

async fn handle_command(command: Command, ctx: &Context) -> Result<(), String> {
    match command {
        Command::Link(cmd) => cmd.execute(ctx).await,
        Command::Qr(cmd) => cmd.execute(ctx).await,
        Command::Card(cmd) => cmd.execute(ctx).await,
        Command::Watch(cmd) => cmd.execute(ctx).await,
    }
}
