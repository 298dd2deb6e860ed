use booking_access::config::cli::load_config;
use booking_access::utils::logger;
use booking_access::AccessReader;
use clap::Parser;
use std::io::BufRead;

/// Door reader simulator: one token (text or hex) per stdin line, evaluated
/// against the local clock.
#[derive(Parser)]
#[command(name = "access-reader")]
#[command(about = "Validate access tokens the way a door reader does")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Override the grace period from config (minutes)
    #[arg(long)]
    grace: Option<i64>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    let config = load_config(args.config.as_deref())?;
    let grace = args.grace.unwrap_or(config.schedule.grace_minutes);
    let reader = AccessReader::new(grace)?;

    tracing::info!("🚪 Reader ready (grace {} min), waiting for tokens on stdin", grace);

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let token = line.trim();
        if token.is_empty() {
            continue;
        }

        match reader.verify(token, chrono::Utc::now()) {
            Ok(decision) => println!("{}", decision),
            Err(e) => println!("REJECTED {}", e.code()),
        }
    }

    Ok(())
}
