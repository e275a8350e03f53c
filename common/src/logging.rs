use std::{fmt, path::Path, str::FromStr};

use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;

/// Verbosity accepted on the command line and in config files.
///
/// Mirrors `log::LevelFilter` but implements `Default` (`Info`) and, with
/// the `clap` feature, derives `ValueEnum` so it can be used directly as a
/// CLI flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };
        write!(f, "{s}")
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

/// What to log where. The file sink rotates once a day, named after the
/// date it was opened on; console output is colored by level.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    pub file_level: Option<LogLevel>,
    pub logs_path: String,
    pub filename_prefix: String,
    pub disable_file_logging: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file_level: None,
            logs_path: "logs/".to_owned(),
            filename_prefix: "zion-audit-oracle".to_owned(),
            disable_file_logging: false,
        }
    }
}

/// Initializes the global logger. Safe to call exactly once per process.
pub fn init(config: &LogConfig) -> Result<(), fern::InitError> {
    let colors = ColoredLevelConfig::new()
        .info(Color::Green)
        .warn(Color::Yellow)
        .error(Color::Red)
        .debug(Color::Blue)
        .trace(Color::Magenta);

    let console = fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .level(config.level.into())
        .chain(std::io::stdout());

    let mut dispatch = fern::Dispatch::new().chain(console);

    if !config.disable_file_logging {
        std::fs::create_dir_all(&config.logs_path)?;
        let file = fern::Dispatch::new()
            .format(|out, message, record| {
                out.finish(format_args!(
                    "{} [{}] {}: {}",
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                    record.level(),
                    record.target(),
                    message
                ))
            })
            .level(config.file_level.unwrap_or(config.level).into())
            .chain(fern::DateBased::new(
                Path::new(&config.logs_path),
                format!("{}.%Y-%m-%d.log", config.filename_prefix),
            ));
        dispatch = dispatch.chain(file);
    }

    dispatch.apply()?;
    Ok(())
}
