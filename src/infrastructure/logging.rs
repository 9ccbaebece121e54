//! Logging initialization
//!
//! Console output always; optional daily-rotated file output. Timestamps
//! are formatted in KST (UTC+9) since every supported storefront is Korean.

use anyhow::{Context, Result};
use chrono::{FixedOffset, Utc};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::infrastructure::config::LoggingConfig;

/// Time formatter for KST (UTC+9).
struct KstTime;

impl FormatTime for KstTime {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        // UTC+9 never fails to construct.
        let kst = FixedOffset::east_opt(9 * 3600).expect("fixed offset in range");
        write!(w, "{}", Utc::now().with_timezone(&kst).format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// Initialize the tracing subscriber.
///
/// Returns the file writer guard, which must be held for the lifetime of
/// the process when file output is enabled.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .context("invalid log level in config")?;

    let console_layer = fmt::layer().with_timer(KstTime).with_target(true);

    if config.file_output {
        let appender = tracing_appender::rolling::daily(&config.log_dir, "pricewatch.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);

        let file_layer = fmt::layer()
            .with_timer(KstTime)
            .with_ansi(false)
            .with_writer(writer);

        tracing_subscriber::registry()
            .with(filter)
            .with(console_layer)
            .with(file_layer)
            .try_init()
            .context("failed to initialize logging")?;

        Ok(Some(guard))
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(console_layer)
            .try_init()
            .context("failed to initialize logging")?;

        Ok(None)
    }
}
