use booking_access::config::cli::{load_config, Command};
use booking_access::core::access_codec::{decode_any, AccessReader};
use booking_access::core::ReservationStore;
use booking_access::utils::error::{BookingError, ErrorSeverity};
use booking_access::utils::{logger, validation::Validate};
use booking_access::{
    BookingRequest, Cli, HttpReservationStore, LocalReservationStore, ReservationService,
    TomlConfig,
};
use clap::Parser;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {}", e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 初始化日誌
    if cli.json_logs || config.logging.json {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose || config.logging.verbose);
    }
    tracing::debug!("CLI args: {:?}", cli);

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if let Err(e) = run(cli.command, &config).await {
        tracing::error!(
            "❌ Command failed: {} (Code: {}, Category: {:?}, Severity: {:?})",
            e,
            e.code(),
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ [{}] {}", e.code(), e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        // 根據錯誤嚴重程度決定退出碼
        let exit_code = match e.severity() {
            ErrorSeverity::Low => 2,
            ErrorSeverity::Medium => 3,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 4,
        };
        std::process::exit(exit_code);
    }

    Ok(())
}

fn build_service(config: &TomlConfig) -> Result<ReservationService, BookingError> {
    let schedule = config.schedule.clone();
    let timezone = schedule.tz()?;
    let policy = config.store_policy();

    let local = |path: &str| -> Arc<dyn ReservationStore> {
        Arc::new(LocalReservationStore::new(path, schedule.classes.clone()).with_timezone(timezone))
    };

    let service = match (config.store_endpoint(), config.fallback_path()) {
        (Some(endpoint), fallback) => {
            tracing::info!("🌐 Primary store: {}", endpoint);
            let primary = Arc::new(HttpReservationStore::new(endpoint).with_timeout(policy.timeout));
            let service = ReservationService::new(schedule.clone(), primary)?;
            match fallback {
                Some(path) => {
                    tracing::info!("💾 Fallback store: {}", path);
                    service.with_fallback(local(path))
                }
                None => service,
            }
        }
        (None, Some(path)) => {
            tracing::info!("💾 No store endpoint configured, using local store at {}", path);
            ReservationService::new(schedule.clone(), local(path))?
        }
        (None, None) => {
            return Err(BookingError::InvalidConfig {
                field: "store.endpoint".to_string(),
                value: String::new(),
                reason: "Configure a store endpoint or enable the fallback store".to_string(),
            })
        }
    };

    Ok(service.with_policy(policy))
}

async fn run(command: Command, config: &TomlConfig) -> Result<(), BookingError> {
    match command {
        Command::Slots => {
            for slot in config.schedule.slots()? {
                println!("{}", slot);
            }
        }
        Command::Classes => {
            let service = build_service(config)?;
            for class in service.load_catalog().await {
                println!("{:<6} {:<16} {} min", class.id, class.name, class.duration_minutes);
            }
        }
        Command::Book {
            subject,
            class,
            date,
            start,
            duration,
        } => {
            let service = build_service(config)?;
            service.load_catalog().await;

            let request = BookingRequest {
                subject_id: subject,
                class_id: class,
                date,
                start,
                duration_minutes: duration,
            };
            let booking = service.book(request).await?;
            let reservation = &booking.reservation;

            println!("✅ Reservation {} confirmed ({:?} store)", reservation.id, booking.stored_in);
            println!("   class: {}", reservation.class_id);
            println!("   start: {}", reservation.start_instant.to_rfc3339());
            println!("   end:   {}", reservation.end_instant.to_rfc3339());
            println!("🎫 token: {}", booking.token.text);
            println!("🔢 hex:   {}", booking.token.hex);
        }
        Command::Check { token, now } => {
            let reader = AccessReader::new(config.schedule.grace_minutes)?;
            let now = now.unwrap_or_else(chrono::Utc::now);
            let decision = reader.verify(&token, now)?;
            println!("{}", decision);
        }
        Command::Decode { token } => {
            let fields = decode_any(&token)?;
            println!("{}", serde_json::to_string_pretty(&fields)?);
        }
    }
    Ok(())
}
