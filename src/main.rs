//! Media Relay CLI application
//!
//! Command-line interface for downloading a media asset at a chosen quality,
//! relaying progress to the terminal and delivering the file if it fits under
//! the size ceiling.

use std::process;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use media_relay::cli::{handle_fetch, handle_init, handle_qualities, Cli, Commands};
use media_relay::config::AppConfig;
use media_relay::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();

    // `init` must work even when the existing config is broken
    if let Commands::Init = cli.command {
        init_logging(&cli, None);
        return handle_init().await;
    }

    let config = AppConfig::load(cli.global.config.clone()).await?;
    init_logging(&cli, Some(&config));

    info!("Media Relay v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Fetch(args) => {
            info!("Executing fetch command");
            handle_fetch(args, config, cli.global.quiet).await
        }
        Commands::Qualities(args) => {
            info!("Executing qualities command");
            handle_qualities(args).await
        }
        Commands::Init => handle_init().await,
    }
}

/// Initialize logging from CLI verbosity, falling back to the configured level
fn init_logging(cli: &Cli, config: Option<&AppConfig>) {
    let flagged = cli.global.quiet || cli.global.verbose || cli.global.very_verbose;
    let level = match config {
        Some(config) if !flagged => config.logging.level.clone(),
        _ => cli.log_level().to_string().to_lowercase(),
    };

    let filter = EnvFilter::from_default_env();
    let filter = match format!("media_relay={}", level).parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose)
        .with_writer(std::io::stderr)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
