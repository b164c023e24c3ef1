use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

/// Install the global tracing subscriber.
///
/// Output goes to stdout, plus a rolling file when `enable_file_logging` is
/// set. Level precedence: `logging.level` from config, then `RUST_LOG`, then
/// "info".
pub fn init_with_config(cfg: &LoggingConfig) {
    let filter = match &cfg.level {
        Some(level) => EnvFilter::new(level.as_str()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let file_writer = if cfg.enable_file_logging {
        rolling_file_writer(cfg)
    } else {
        None
    };

    // The two format arms repeat the layer stanzas because json() changes
    // the layer's type; Option<Layer> keeps the file layer optional without
    // a second registry path.
    let registry = tracing_subscriber::registry().with(filter);
    match cfg.format {
        LogFormat::Json => {
            let stdout_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_ansi(false)
                .with_timer(UtcTime::rfc_3339())
                .with_writer(std::io::stdout);
            let file_layer = file_writer.map(|writer| {
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_timer(UtcTime::rfc_3339())
                    .with_writer(writer)
            });
            let _ = registry.with(stdout_layer).with(file_layer).try_init();
        }
        LogFormat::Text => {
            let stdout_layer = tracing_subscriber::fmt::layer()
                .with_ansi(true)
                .with_timer(UtcTime::rfc_3339())
                .with_writer(std::io::stdout);
            let file_layer = file_writer.map(|writer| {
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_timer(UtcTime::rfc_3339())
                    .with_writer(writer)
            });
            let _ = registry.with(stdout_layer).with(file_layer).try_init();
        }
    }
}

/// Non-blocking rolling file writer, or `None` (stdout only) when the log
/// directory cannot be created.
fn rolling_file_writer(cfg: &LoggingConfig) -> Option<tracing_appender::non_blocking::NonBlocking> {
    use crate::config::RotationPolicy;
    use tracing_appender::rolling::{RollingFileAppender, Rotation};

    if let Err(err) = std::fs::create_dir_all(&cfg.dir) {
        eprintln!(
            "Cannot create log directory '{}' ({err}); file logging disabled",
            cfg.dir
        );
        return None;
    }

    let rotation = match cfg.rotation {
        RotationPolicy::Daily => Rotation::DAILY,
        RotationPolicy::Hourly => Rotation::HOURLY,
        RotationPolicy::Never => Rotation::NEVER,
    };

    let appender = RollingFileAppender::new(rotation, &cfg.dir, &cfg.filename);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    // The guard's drop stops the background writer; logging lives for the
    // whole process, so intentionally never drop it.
    std::mem::forget(guard);

    Some(writer)
}
