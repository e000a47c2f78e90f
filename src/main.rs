//! Gita Bot - Entry Point
//!
//! Modes:
//! - Default / --telegram / -t: Telegram bot
//! - --console / -c: read commands from stdin

use gita_bot::{App, Config};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Parse args
    let args: Vec<String> = std::env::args().collect();
    let console_mode = args.iter().any(|a| a == "--console" || a == "-c");
    let help_mode = args.iter().any(|a| a == "--help" || a == "-h");

    if help_mode {
        println!("Gita Bot v{}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Usage: gita-bot [OPTIONS]");
        println!();
        println!("Options:");
        println!("  --telegram, -t     Run as Telegram bot (default)");
        println!("  --console, -c      Read commands from stdin");
        println!("  --help, -h         Show this help");
        println!();
        println!("Environment variables:");
        println!("  TELEGRAM_BOT_TOKEN       Telegram bot token");
        println!("  TELEGRAM_ALLOWED_USERS   Comma-separated user IDs (empty = all)");
        println!("  GITA_<LANG>_FULL         Full text location (URL or path)");
        println!("  GITA_<LANG>_SHORT        Short text location (optional)");
        println!("  GITA_AUDIO_FULL_URL      Base URL of full recitations");
        println!("  GITA_AUDIO_QUARTER_URL   Base URL of quarter clips (empty = none)");
        println!("  GITA_AUDIO_INDEX         JSON audio index file");
        println!("  GITA_SEARCH_LANGUAGE     Language scanned by search (default: Hindi)");
        println!("  GITA_RATE_LIMIT_PER_MIN  Requests per minute per user (default: 30)");
        return Ok(());
    }

    // Setup logging based on mode
    let log_level = std::env::var("RUST_LOG")
        .map(|s| match s.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        })
        .unwrap_or(if console_mode { Level::WARN } else { Level::INFO });

    if console_mode {
        // Replies go to stdout; keep logs out of the way
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_ansi(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    let config = Config::from_env()?;
    info!("Gita Bot v{}", env!("CARGO_PKG_VERSION"));

    let app = App::from_config(&config).await?;
    info!(
        "Library loaded: {} verses in {} languages",
        app.engine.library().index().len(),
        app.engine.library().languages().len()
    );

    if console_mode {
        gita_bot::app::run_console(&app).await?;
    } else {
        gita_bot::telegram::run_telegram_bot(config, app).await?;
    }

    Ok(())
}
