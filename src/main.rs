use barber_slots::config::{Command, OutputFormat};
use barber_slots::core::time_normalizer::TimeNormalizer;
use barber_slots::domain::model::{
    Appointment, CustomerDetails, DayOverview, DaySchedule, ProviderId, TimeOfDay, UpdateRequest,
};
use barber_slots::utils::error::{ErrorSeverity, Operation};
use barber_slots::utils::{logger, validation::Validate};
use barber_slots::{CliConfig, JsonFileStore, SchedulingEngine, SchedulingError, ShopConfig};
use clap::Parser;
use serde::Serialize;
use std::sync::Arc;

/// 狀態訊息：JSON/CSV 模式下改走 stderr，stdout 只留資料
macro_rules! status {
    ($format:expr, $($arg:tt)*) => {
        if $format.is_machine_readable() {
            eprintln!($($arg)*)
        } else {
            println!($($arg)*)
        }
    };
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 載入 TOML 配置
    let shop = match ShopConfig::from_file(&cli.config) {
        Ok(shop) => shop,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", cli.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 初始化日誌
    if shop.json_logging() {
        logger::init_json_logger(shop.log_level());
    } else {
        logger::init_cli_logger_with_level(cli.verbose, shop.log_level());
    }

    tracing::info!("🚀 Starting barber-slots for {}", shop.venue.name);
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    // 驗證配置
    if let Err(e) = cli.validate().and_then(|_| shop.validate()) {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if let Command::Check = cli.command {
        display_config_summary(&shop);
        println!("✅ Configuration is valid");
        return Ok(());
    }

    match run(&cli, &shop).await {
        Ok(()) => {}
        Err(e) => match e.downcast_ref::<SchedulingError>() {
            Some(e) => {
                // 記錄詳細錯誤信息
                tracing::error!(
                    "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
                    e,
                    e.category(),
                    e.severity()
                );
                tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

                eprintln!("❌ {}", e.user_friendly_message());
                eprintln!("💡 建議: {}", e.recovery_suggestion());

                // 根據錯誤嚴重程度決定退出碼
                let exit_code = match e.severity() {
                    ErrorSeverity::Low => 0,      // 警告，但成功
                    ErrorSeverity::Medium => 2,   // 可重試
                    ErrorSeverity::High => 1,     // 請求本身有問題
                    ErrorSeverity::Critical => 3, // 系統錯誤
                };

                if exit_code > 0 {
                    std::process::exit(exit_code);
                }
            }
            None => {
                tracing::error!("❌ Command failed: {:#}", e);
                eprintln!("❌ {:#}", e);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}

async fn run(cli: &CliConfig, shop: &ShopConfig) -> anyhow::Result<()> {
    let store = JsonFileStore::open(shop.store_path())
        .await
        .map_err(|e| SchedulingError::store(Operation::Lookup, e))?;
    store
        .seed_providers(shop.providers.iter().cloned())
        .await
        .map_err(|e| SchedulingError::store(Operation::Lookup, e))?;
    tracing::debug!("📁 Using schedule file {}", store.path().display());

    let engine = SchedulingEngine::new(Arc::new(store), shop.engine_settings()?)?;
    let format = cli.format;

    match &cli.command {
        Command::Providers => {
            let providers = engine.providers().await?;
            match format {
                OutputFormat::Table => {
                    for provider in &providers {
                        println!("{:>4}  {}", provider.id, provider.name);
                    }
                }
                _ => emit(format, &providers)?,
            }
        }
        Command::Schedule {
            provider,
            date,
            public,
        } => {
            let provider = ProviderId(*provider);
            let date = TimeNormalizer::parse_date(date)?;
            let schedule = if *public {
                engine.public_day_schedule(provider, date).await?
            } else {
                engine.get_day_schedule(provider, date).await?
            };
            print_schedule(format, &schedule)?;
        }
        Command::Month {
            provider,
            year,
            month,
        } => {
            let overview = engine
                .month_overview(ProviderId(*provider), *year, *month)
                .await?;
            print_overview(format, &overview)?;
        }
        Command::Reserve {
            provider,
            slot,
            name,
            phone,
        } => {
            let slot = engine
                .normalizer()
                .to_calendar_slot(ProviderId(*provider), slot.raw_input()?)?;
            let appointment = engine
                .reserve(
                    slot.provider_id,
                    slot.date,
                    slot.time_of_day,
                    CustomerDetails::new(name.as_str(), phone.as_str()),
                )
                .await?;
            status!(format, "✅ Reserved {}", slot);
            print_appointments(format, std::slice::from_ref(&appointment))?;
        }
        Command::Update {
            id,
            date,
            time,
            name,
            phone,
        } => {
            let request = UpdateRequest {
                date: date.as_deref().map(TimeNormalizer::parse_date).transpose()?,
                time_of_day: time
                    .as_deref()
                    .map(TimeNormalizer::parse_time_of_day)
                    .transpose()?,
                customer_name: name.clone(),
                phone: phone.clone(),
            };
            let appointment = engine.update_reservation(*id, request).await?;
            status!(format, "✅ Updated appointment {}", appointment.id);
            print_appointments(format, std::slice::from_ref(&appointment))?;
        }
        Command::Cancel { id } => {
            engine.cancel(*id).await?;
            status!(format, "✅ Cancelled appointment {}", id);
        }
        Command::CloseSlot {
            provider,
            slot,
            reason,
        } => {
            let slot = engine
                .normalizer()
                .to_calendar_slot(ProviderId(*provider), slot.raw_input()?)?;
            match engine
                .close_slot(slot.provider_id, slot.date, slot.time_of_day, reason.clone())
                .await?
            {
                Some(_) => status!(format, "✅ {} is closed", slot),
                None => status!(format, "⚠️ {} is booked and was left open", slot),
            }
        }
        Command::OpenSlot { provider, slot } => {
            let slot = engine
                .normalizer()
                .to_calendar_slot(ProviderId(*provider), slot.raw_input()?)?;
            if engine
                .open_slot(slot.provider_id, slot.date, slot.time_of_day)
                .await?
            {
                status!(format, "✅ {} is open again", slot);
            } else {
                status!(format, "✅ {} was not closed", slot);
            }
        }
        Command::CloseDay {
            provider,
            date,
            reason,
        } => {
            let date = TimeNormalizer::parse_date(date)?;
            let closed = engine
                .close_day(ProviderId(*provider), date, reason.clone())
                .await?;
            status!(format, "✅ Closed {} slots on {}", closed, date);
        }
        Command::OpenDay { provider, date } => {
            let date = TimeNormalizer::parse_date(date)?;
            let opened = engine.open_day(ProviderId(*provider), date).await?;
            status!(format, "✅ Opened {} slots on {}", opened, date);
        }
        Command::List { provider, from, to } => {
            let from = TimeNormalizer::parse_date(from)?;
            let to = TimeNormalizer::parse_date(to)?;
            let appointments = engine
                .appointments_in_range(provider.map(ProviderId), from, to)
                .await?;
            print_appointments(format, &appointments)?;
        }
        Command::Check => {}
    }

    Ok(())
}

fn display_config_summary(shop: &ShopConfig) {
    println!("📋 Configuration Summary:");
    println!("  Venue: {}", shop.venue.name);
    if let Ok(zone) = shop.timezone() {
        println!("  Time zone: {}", zone);
    }
    println!(
        "  Working hours: {} - {} every {} minutes",
        shop.working_hours.start, shop.working_hours.end, shop.working_hours.interval_minutes
    );
    println!("  Providers: {}", shop.providers.len());
    println!("  Store: {}", shop.store_path());
    println!();
}

/// CSV 需要扁平的欄位
#[derive(Serialize)]
struct ScheduleRow<'a> {
    time: TimeOfDay,
    status: String,
    appointment_id: Option<String>,
    customer_name: Option<&'a str>,
    phone: Option<&'a str>,
    reason: Option<&'a str>,
}

fn print_schedule(format: OutputFormat, schedule: &DaySchedule) -> anyhow::Result<()> {
    for warning in &schedule.warnings {
        tracing::warn!("⚠️ {:?}", warning);
    }

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(schedule)?);
            Ok(())
        }
        OutputFormat::Csv => {
            let rows: Vec<ScheduleRow> = schedule
                .entries
                .iter()
                .map(|entry| ScheduleRow {
                    time: entry.time_of_day,
                    status: entry.status.to_string(),
                    appointment_id: entry.appointment.as_ref().map(|a| a.id.to_string()),
                    customer_name: entry.appointment.as_ref().map(|a| a.customer_name.as_str()),
                    phone: entry.appointment.as_ref().and_then(|a| a.phone.as_deref()),
                    reason: entry.reason.as_deref(),
                })
                .collect();
            emit(format, &rows)
        }
        OutputFormat::Table => {
            println!(
                "📅 Provider {} on {} ({} slots)",
                schedule.provider_id,
                schedule.date,
                schedule.entries.len()
            );
            for entry in &schedule.entries {
                let detail = match (&entry.appointment, &entry.reason) {
                    (Some(a), _) => match &a.phone {
                        Some(phone) => format!("{} ({}) [{}]", a.customer_name, phone, a.id),
                        None => a.customer_name.clone(),
                    },
                    (None, Some(reason)) => reason.clone(),
                    (None, None) => String::new(),
                };
                println!(
                    "  {}  {:<6}  {}",
                    entry.time_of_day,
                    entry.status.to_string(),
                    detail
                );
            }
            Ok(())
        }
    }
}

fn print_overview(format: OutputFormat, overview: &[DayOverview]) -> anyhow::Result<()> {
    match format {
        OutputFormat::Table => {
            for day in overview {
                println!(
                    "  {}  {:<7}  booked {:>2}  closed {:>2}  open {:>2}",
                    day.date,
                    format!("{:?}", day.load),
                    day.booked,
                    day.closed,
                    day.open
                );
            }
            Ok(())
        }
        _ => emit(format, overview),
    }
}

fn print_appointments(format: OutputFormat, appointments: &[Appointment]) -> anyhow::Result<()> {
    match format {
        OutputFormat::Table => {
            for appointment in appointments {
                println!(
                    "  {}  provider {}  {}  {} ({})",
                    appointment.starts_at.format("%Y-%m-%d %H:%M"),
                    appointment.provider_id,
                    appointment.id,
                    appointment.customer_name,
                    appointment.phone
                );
            }
            Ok(())
        }
        _ => emit(format, appointments),
    }
}

/// JSON 輸出整個陣列，CSV 每個元素一列
fn emit<T: Serialize>(format: OutputFormat, rows: &[T]) -> anyhow::Result<()> {
    match format {
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(std::io::stdout());
            for row in rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
        _ => println!("{}", serde_json::to_string_pretty(rows)?),
    }
    Ok(())
}
