use std::fs;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::LoggingConfig;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Progress lines go to the console and to `<dir>/progress.<date>.log`.
/// Structured execution records are written separately, see
/// [`crate::pipeline::record::DailyRecordSink`].
pub fn init_tracing(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let console = if config.json {
        fmt::layer().json().with_filter(env_filter()).boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_filter(env_filter())
            .boxed()
    };

    fs::create_dir_all(&config.dir)?;
    let progress_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("progress")
        .filename_suffix("log")
        .build(&config.dir)?;

    let progress = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(progress_appender)
        .with_filter(env_filter());

    tracing_subscriber::registry()
        .with(console)
        .with(progress)
        .try_init()?;

    Ok(())
}
