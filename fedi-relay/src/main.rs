//! fedi-relay - Relay public Telegram channel posts to Mastodon
//!
//! Long-running daemon: receives channel posts through the Telegram Bot API
//! and republishes them as reply chains on the mapped Mastodon accounts.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use libfedirelay::config::Config;
use libfedirelay::logging::{LogFormat, LoggingConfig};
use libfedirelay::media::MediaStager;
use libfedirelay::error::PlatformError;
use libfedirelay::platforms::mastodon::MastodonClient;
use libfedirelay::platforms::Destination;
use libfedirelay::source::telegram::TelegramSource;
use libfedirelay::{Dispatcher, MappingTable, Normalizer, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "fedi-relay")]
#[command(version)]
#[command(about = "Relay public Telegram channel posts to Mastodon accounts")]
#[command(long_about = "\
fedi-relay - Relay public Telegram channel posts to Mastodon accounts

DESCRIPTION:
    fedi-relay listens for new posts in the configured Telegram channels and
    republishes each one on every Mastodon account mapped to the channel.

    Posts are converted to plain text with a link back to the original.
    Text longer than an account's post limit is split into a reply chain.
    A photo, video or animation is attached to the first post of the chain.
    Albums are not relayed.

    The Telegram bot must be an administrator of every source channel.

USAGE:
    # Run in foreground (logs to stderr)
    fedi-relay

    # Use a specific configuration file
    fedi-relay --config /etc/fedirelay/config.toml

    # Validate configuration and exit
    fedi-relay --check

    # Machine-readable logs
    fedi-relay --log-format json

SIGNALS:
    SIGTERM, SIGINT - Stop receiving new posts and exit

CONFIGURATION:
    Configuration file: ~/.config/fedirelay/config.toml
    (override with --config or FEDIRELAY_CONFIG)

    [telegram]
    token_file = \"~/.config/fedirelay/telegram.token\"
    channels = [\"channel_one\"]

    [[mastodon.accounts]]
    name = \"main\"
    instance = \"https://mastodon.social\"
    token_file = \"~/.config/fedirelay/main.token\"
    post_size_limit = 500

    [[mastodon.mappings]]
    tg_channel_handle = \"channel_one\"
    account_name = \"main\"

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration or authentication error
")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, value_name = "PATH", env = "FEDIRELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_name = "FORMAT", env = "FEDIRELAY_LOG_FORMAT", default_value = "text")]
    #[arg(help = "Log output format: text, json, or pretty")]
    log_format: LogFormat,

    /// Minimum log level or filter directive
    #[arg(long, value_name = "LEVEL", env = "FEDIRELAY_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    #[arg(help = "Enable debug logging (overrides --log-level)")]
    verbose: bool,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    LoggingConfig::new(cli.log_format, cli.log_level.clone(), cli.verbose).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    if cli.check {
        print_summary(&config);
        return Ok(());
    }

    info!("fedi-relay starting");

    let mappings = MappingTable::from_config(&config.mastodon);
    warn_unknown_accounts(&config);

    let source = Arc::new(TelegramSource::from_config(&config.telegram)?);
    let bot_name = source.authenticate().await?;
    info!("Authenticated with Telegram as @{}", bot_name);

    let unresolved = source.resolve_channels(&config.telegram.channels).await;
    if !unresolved.is_empty() {
        warn!(
            "{} channel(s) could not be resolved; their posts arrive once the bot has access",
            unresolved.len()
        );
    }

    let mut dispatcher = Dispatcher::new(
        mappings,
        source.clone(),
        MediaStager::new(config.staging_dir()),
        Normalizer::new(config.telegram.link_host.clone()),
    );

    let mut clients: Vec<Arc<dyn Destination>> = Vec::new();
    for account in &config.mastodon.accounts {
        let client = MastodonClient::from_config(account)?;
        info!(
            "Connecting Mastodon account '{}' at {}",
            account.name,
            client.instance_url()
        );
        clients.push(Arc::new(client));
    }

    let total = clients.len();
    let rejected = dispatcher.connect(clients).await;
    if total > 0 && rejected.len() == total {
        return Err(PlatformError::Authentication(format!(
            "no Mastodon account could be authenticated ({})",
            rejected.join(", ")
        ))
        .into());
    }

    let cancel = CancellationToken::new();
    setup_signal_handlers(cancel.clone())?;

    source.run(Arc::new(dispatcher), cancel).await?;

    info!("fedi-relay stopped");
    Ok(())
}

/// Print what the configuration routes where
fn print_summary(config: &Config) {
    println!("Configuration OK");
    println!("Telegram channels: {}", config.telegram.channels.join(", "));
    println!("Link host: {}", config.telegram.link_host);
    println!("Staging directory: {}", config.staging_dir().display());

    for account in &config.mastodon.accounts {
        let visibility = account
            .visibility
            .map(|v| v.to_string())
            .unwrap_or_else(|| "server default".to_string());
        println!(
            "Account '{}': {} (limit {}, visibility {})",
            account.name, account.instance, account.post_size_limit, visibility
        );
    }

    for mapping in &config.mastodon.mappings {
        println!("  {} -> {}", mapping.tg_channel_handle, mapping.account_name);
    }
}

/// Mapped accounts without an account entry fail every relay from their channel
fn warn_unknown_accounts(config: &Config) {
    for mapping in &config.mastodon.mappings {
        let known = config
            .mastodon
            .accounts
            .iter()
            .any(|account| account.name == mapping.account_name);
        if !known {
            warn!(
                "Channel '{}' is mapped to undefined account '{}'; its posts will not be relayed",
                mapping.tg_channel_handle, mapping.account_name
            );
        }
    }
}

/// Cancel `cancel` on SIGINT or SIGTERM
#[cfg(unix)]
fn setup_signal_handlers(cancel: CancellationToken) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;

    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!("Received signal {}, shutting down", sig);
            cancel.cancel();
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(cancel: CancellationToken) -> Result<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, shutting down");
            cancel.cancel();
        }
    });
    Ok(())
}
