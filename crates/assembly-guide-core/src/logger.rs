//! Stderr logging for the guide binaries and tests.
//!
//! Each record becomes one line, `[  12.345s  INFO session] page 0 complete`:
//! seconds since [`init_with_level`] ran, the level, the module the record came
//! from, then the message. [`init_from_env`] picks the level from
//! `ASSEMBLY_GUIDE_LOG`. With the `tracing` feature, [`init_tracing`] installs a
//! `tracing-subscriber` instead, filtered by the same variable.

use std::fmt::Arguments;
use std::io::Write;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding the log level (or tracing filter directives).
pub const LOG_ENV: &str = "ASSEMBLY_GUIDE_LOG";

struct GuideLogger {
    level: LevelFilter,
    started: Instant,
}

/// `assembly_guide_session::page` -> `page`.
fn short_target(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

fn format_line(elapsed: f64, level: Level, target: &str, args: &Arguments<'_>) -> String {
    format!(
        "[{elapsed:8.3}s {level:>5} {}] {args}",
        short_target(target)
    )
}

impl Log for GuideLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(
            self.started.elapsed().as_secs_f64(),
            record.level(),
            record.target(),
            record.args(),
        );
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<GuideLogger> = OnceLock::new();

/// Install the stderr logger at `level`. Later calls keep the first logger.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_some() {
        return Ok(());
    }
    let logger = LOGGER.get_or_init(|| GuideLogger {
        level,
        started: Instant::now(),
    });
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}

fn level_from(value: Option<&str>, default: LevelFilter) -> LevelFilter {
    value
        .and_then(|v| LevelFilter::from_str(v.trim()).ok())
        .unwrap_or(default)
}

/// Install the stderr logger at the level in `ASSEMBLY_GUIDE_LOG`, or `default`.
pub fn init_from_env(default: LevelFilter) -> Result<(), log::SetLoggerError> {
    let value = std::env::var(LOG_ENV).ok();
    init_with_level(level_from(value.as_deref(), default))
}

/// Install a `tracing` subscriber that closes spans around rectify and detect.
///
/// `json` switches to one flattened JSON object per event.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE);
    let _ = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
}
