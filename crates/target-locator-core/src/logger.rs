//! Stderr logging for the pipeline binaries.
//!
//! Records look like `[  12.034s  WARN locator target_locator::sink] message`:
//! elapsed time, level, thread name and module. Records from this
//! workspace's crates pass at the configured level; third-party crates are
//! capped at `Warn` so a `debug` run stays readable.

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, fmt::format::FmtSpan, EnvFilter};

const OWN_PREFIX: &str = "target_locator";

struct PipelineLogger {
    own: LevelFilter,
    foreign: LevelFilter,
    epoch: Instant,
}

impl PipelineLogger {
    fn new(level: LevelFilter) -> Self {
        Self {
            own: level,
            foreign: level.min(LevelFilter::Warn),
            epoch: Instant::now(),
        }
    }

    fn limit_for(&self, target: &str) -> LevelFilter {
        if target.starts_with(OWN_PREFIX) {
            self.own
        } else {
            self.foreign
        }
    }
}

impl Log for PipelineLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.limit_for(metadata.target())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let thread = std::thread::current();
        let line = format!(
            "[{:9.3}s {:>5} {} {}] {}\n",
            self.epoch.elapsed().as_secs_f64(),
            record.level(),
            thread.name().unwrap_or("-"),
            record.target(),
            record.args()
        );
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        if record.level() == Level::Error {
            let _ = err.flush();
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static INSTALLED: OnceLock<PipelineLogger> = OnceLock::new();

/// Install the stderr logger. Only the first call has an effect.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    let mut fresh = false;
    let logger = INSTALLED.get_or_init(|| {
        fresh = true;
        PipelineLogger::new(level)
    });
    if fresh {
        log::set_logger(logger)?;
        log::set_max_level(logger.own);
    }
    Ok(())
}

/// Install a `tracing` fmt subscriber as the global default, with span-close
/// timings. `RUST_LOG` overrides `default_level`; `json` switches to one JSON
/// object per event. `log` records reach it once `tracing_log::LogTracer` is
/// installed.
#[cfg(feature = "tracing")]
pub fn init_tracing(
    default_level: LevelFilter,
    json: bool,
) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_str().to_ascii_lowercase()));
    let builder = fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_thread_names(true);
    if json {
        tracing::subscriber::set_global_default(builder.json().flatten_event(true).finish())
    } else {
        tracing::subscriber::set_global_default(
            builder.with_timer(fmt::time::Uptime::default()).finish(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foreign_crates_are_capped_at_warn() {
        let logger = PipelineLogger::new(LevelFilter::Debug);
        assert_eq!(logger.limit_for("target_locator::pipeline"), LevelFilter::Debug);
        assert_eq!(logger.limit_for("target_locator_core::pose"), LevelFilter::Debug);
        assert_eq!(logger.limit_for("imageproc::contours"), LevelFilter::Warn);

        let quiet = PipelineLogger::new(LevelFilter::Error);
        assert_eq!(quiet.limit_for("imageproc"), LevelFilter::Error);
    }

    #[test]
    fn repeated_init_keeps_first_level() {
        assert!(init_with_level(LevelFilter::Warn).is_ok());
        assert!(init_with_level(LevelFilter::Debug).is_ok());
        assert_eq!(log::max_level(), LevelFilter::Warn);
    }

    #[cfg(feature = "tracing")]
    #[test]
    fn tracing_filter_defaults_to_requested_level() {
        use tracing::level_filters::LevelFilter as TracingLevel;

        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        assert!(init_tracing(LevelFilter::Debug, false).is_ok());
        assert_eq!(TracingLevel::current(), TracingLevel::DEBUG);
        assert!(init_tracing(LevelFilter::Trace, true).is_err());
    }
}
