use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

fn default_filter(verbose: bool, level: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directive = match (verbose, level) {
            (true, _) => "barber_slots=debug,info".to_string(),
            (false, Some(level)) => format!("barber_slots={}", level),
            (false, None) => "barber_slots=info".to_string(),
        };
        EnvFilter::new(directive)
    })
}

pub fn init_cli_logger(verbose: bool) {
    init_cli_logger_with_level(verbose, None);
}

/// `level` 來自設定檔的 `[logging] level`，`RUST_LOG` 優先
pub fn init_cli_logger_with_level(verbose: bool, level: Option<&str>) {
    let result = tracing_subscriber::registry()
        .with(default_filter(verbose, level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init();
    report_already_initialized(result);
}

pub fn init_json_logger(level: Option<&str>) {
    let result = tracing_subscriber::registry()
        .with(default_filter(false, level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .json(), // 給集中式日誌收集用
        )
        .try_init();
    report_already_initialized(result);
}

/// 全域 subscriber 只能設定一次，重複初始化時沿用原本的那個
fn report_already_initialized(result: Result<(), TryInitError>) {
    if let Err(e) = result {
        tracing::debug!("Keeping the existing global logger: {}", e);
    }
}
