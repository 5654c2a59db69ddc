use std::env;

use tracing::info;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

// 全局变量用于保持日志文件句柄
use std::sync::OnceLock;

static INFO_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
static ERROR_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

// 设置日志
pub async fn setup_logging() -> anyhow::Result<()> {
    let app_env = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let log_dir = env::var("LOG_DIR").unwrap_or_else(|_| "log_files".to_string());

    // 本地环境：仅控制台输出
    if app_env == "local" {
        let subscriber = Registry::default().with(
            fmt::layer()
                .with_ansi(true)
                .with_target(false)
                .with_level(true)
                .with_writer(std::io::stdout)
                .with_filter(EnvFilter::new(&log_level)),
        );
        tracing::subscriber::set_global_default(subscriber)?;

        info!("Log configuration setup successfully!");
        return Ok(());
    }

    // 非本地环境：info/error 分文件按日轮转输出
    std::fs::create_dir_all(&log_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create log directory '{}': {}", log_dir, e))?;

    let info_file = RollingFileAppender::new(Rotation::DAILY, &log_dir, "info.log");
    let error_file = RollingFileAppender::new(Rotation::DAILY, &log_dir, "error.log");

    let (info_non_blocking, info_guard) = tracing_appender::non_blocking(info_file);
    let (error_non_blocking, error_guard) = tracing_appender::non_blocking(error_file);

    // 保存guard到全局，防止被丢弃
    INFO_GUARD
        .set(info_guard)
        .map_err(|_| anyhow::anyhow!("Failed to set INFO_GUARD"))?;
    ERROR_GUARD
        .set(error_guard)
        .map_err(|_| anyhow::anyhow!("Failed to set ERROR_GUARD"))?;

    let subscriber = Registry::default()
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_level(true)
                .with_writer(info_non_blocking)
                .with_filter(EnvFilter::new(&log_level)),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_level(true)
                .with_writer(error_non_blocking)
                .with_filter(EnvFilter::new("error")),
        );
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Log configuration setup successfully!");
    info!("Environment: {}, Log Level: {}", app_env, log_level);
    Ok(())
}
