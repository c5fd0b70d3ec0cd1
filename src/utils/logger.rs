//! log4rs wiring for processes embedding the pool.
//!
//! Three destinations: `app.log` (root logger), `metrics.log` (target `clientpool::metrics`,
//! used by `ClientPool::log_stats`) and, when enabled, `events.log` for the TRACE-level
//! `clientpool::events` stream.

use log::LevelFilter;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::{Path, PathBuf};

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE_BYTES: u64 = 10 * 1024 * 1024;

/// Initializes the logging system from a log4rs YAML/TOML config file.
///
/// # Errors
/// Returns an error if the file cannot be read or the logger is already set.
pub fn init_path(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    log4rs::init_file(path, log4rs::config::Deserializers::default())?;
    Ok(())
}

pub fn parse_level(level: Option<&str>) -> LevelFilter {
    match level.unwrap_or("info").to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling_appender(
    base: &Path,
    name: &str,
    keep: u32,
) -> Result<RollingFileAppender, Box<dyn std::error::Error>> {
    let roller = FixedWindowRoller::builder()
        .build(&format!("{}", base.join(format!("{name}.{{}}.log")).display()), keep)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE_BYTES)), Box::new(roller));
    let appender = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(base.join(format!("{name}.log")), Box::new(policy))?;
    Ok(appender)
}

/// Builds the log4rs config without installing it.
/// - dir: base directory for logs; created if missing
/// - level: error|warn|info|debug|trace
/// - retention: number of rolled files to keep (default 7)
/// - events: also persist the TRACE `clientpool::events` stream
///
/// # Errors
/// Returns an error if the directory or an appender cannot be created.
pub fn build_config(
    dir: &Path,
    level: LevelFilter,
    retention: Option<u32>,
    events: bool,
) -> Result<Config, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(dir)?;
    let keep = retention.unwrap_or(7);
    let mut builder = Config::builder()
        .appender(Appender::builder().build("app", Box::new(rolling_appender(dir, "app", keep)?)))
        .appender(
            Appender::builder().build("metrics", Box::new(rolling_appender(dir, "metrics", keep)?)),
        )
        .logger(Logger::builder().appender("metrics").additive(false).build("clientpool::metrics", level));

    builder = if events {
        builder
            .appender(
                Appender::builder().build("events", Box::new(rolling_appender(dir, "events", keep)?)),
            )
            .logger(
                Logger::builder()
                    .appender("events")
                    .additive(false)
                    .build(crate::utils::devlog::EVENTS_TARGET, LevelFilter::Trace),
            )
    } else {
        builder.logger(
            Logger::builder().additive(false).build(crate::utils::devlog::EVENTS_TARGET, LevelFilter::Off),
        )
    };

    Ok(builder.build(Root::builder().appender("app").build(level))?)
}

/// Configure logging globally for the process. A second call is ignored by log4rs.
///
/// # Errors
/// Returns an error if the configuration cannot be built or installed.
pub fn configure_logging(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<u32>,
    events: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let base = dir
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    let config = build_config(&base, parse_level(level), retention, events)?;
    log4rs::init_config(config)?;
    Ok(())
}

/// Logging settings gathered from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogSettings {
    pub dir: Option<PathBuf>,
    pub level: Option<String>,
    pub retention: Option<u32>,
    pub events: bool,
}

impl LogSettings {
    /// Reads, when present:
    /// - CLIENTPOOL_LOG_DIR
    /// - CLIENTPOOL_LOG_LEVEL
    /// - CLIENTPOOL_LOG_RETENTION (ignored unless a non-negative integer)
    /// - CLIENTPOOL_TRACE_EVENTS (1/true/yes/on, case-insensitive)
    pub fn from_env() -> Self {
        Self {
            dir: std::env::var_os("CLIENTPOOL_LOG_DIR").map(PathBuf::from),
            level: std::env::var("CLIENTPOOL_LOG_LEVEL").ok(),
            retention: std::env::var("CLIENTPOOL_LOG_RETENTION")
                .ok()
                .and_then(|s| s.trim().parse::<u32>().ok()),
            events: std::env::var("CLIENTPOOL_TRACE_EVENTS")
                .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(false),
        }
    }
}

/// Configure logging from [`LogSettings::from_env`].
///
/// # Errors
/// See [`configure_logging`].
pub fn configure_from_env() -> Result<(), Box<dyn std::error::Error>> {
    let s = LogSettings::from_env();
    configure_logging(s.dir.as_deref(), s.level.as_deref(), s.retention, s.events)
}

#[cfg(test)]
mod tests {
    use super::*;

    static ENV_LOCK: parking_lot::Mutex<()> = parking_lot::const_mutex(());

    const VARS: [&str; 4] = [
        "CLIENTPOOL_LOG_DIR",
        "CLIENTPOOL_LOG_LEVEL",
        "CLIENTPOOL_LOG_RETENTION",
        "CLIENTPOOL_TRACE_EVENTS",
    ];

    fn with_env<T>(vars: &[(&str, &str)], f: impl FnOnce() -> T) -> T {
        let _lock = ENV_LOCK.lock();
        // SAFETY: ENV_LOCK serialises the tests in this module that touch these variables.
        unsafe {
            for name in VARS {
                std::env::remove_var(name);
            }
            for (name, value) in vars {
                std::env::set_var(name, value);
            }
        }
        let out = f();
        // SAFETY: lock still held.
        unsafe {
            for name in VARS {
                std::env::remove_var(name);
            }
        }
        out
    }

    #[test]
    fn env_settings_are_parsed() {
        let s = with_env(
            &[
                ("CLIENTPOOL_LOG_DIR", "/tmp/clientpool-logs"),
                ("CLIENTPOOL_LOG_LEVEL", "debug"),
                ("CLIENTPOOL_LOG_RETENTION", " 3 "),
                ("CLIENTPOOL_TRACE_EVENTS", "TRUE"),
            ],
            LogSettings::from_env,
        );
        assert_eq!(s.dir, Some(PathBuf::from("/tmp/clientpool-logs")));
        assert_eq!(s.level.as_deref(), Some("debug"));
        assert_eq!(s.retention, Some(3));
        assert!(s.events);
    }

    #[test]
    fn bad_env_values_fall_back() {
        let s = with_env(
            &[("CLIENTPOOL_LOG_RETENTION", "-1"), ("CLIENTPOOL_TRACE_EVENTS", "nope")],
            LogSettings::from_env,
        );
        assert_eq!(s.retention, None);
        assert!(!s.events);
        assert_eq!(with_env(&[], LogSettings::from_env), LogSettings::default());
    }

    #[test]
    fn level_parsing_defaults_to_info() {
        assert_eq!(parse_level(None), LevelFilter::Info);
        assert_eq!(parse_level(Some("DEBUG")), LevelFilter::Debug);
        assert_eq!(parse_level(Some("nonsense")), LevelFilter::Info);
    }

    #[test]
    fn build_config_creates_dir_and_routes_targets() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        let cfg = build_config(&logs, LevelFilter::Info, Some(2), true).unwrap();
        assert!(logs.is_dir());
        assert_eq!(cfg.loggers().len(), 2);
    }
}
