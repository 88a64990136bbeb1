use std::{borrow::Cow, fmt, io::IsTerminal, path::PathBuf, str::FromStr};

use clap::{Parser, ValueEnum};
use logforth::filter::EnvFilter;

/// Command-line interface for the `funnel` aggregating MCP proxy.
#[derive(Debug, Parser)]
#[command(name = "mcp-funnel", version, long_about = concat!("mcp-funnel v", env!("CARGO_PKG_VERSION")))]
pub struct Args {
    /// Path to the project-level JSON configuration file.
    #[arg(env = "MCP_FUNNEL_CONFIG", default_value = config::DEFAULT_PROJECT_CONFIG)]
    pub config_path: PathBuf,
    /// Set the logging level, applied to all spans, logs, and trace events.
    #[arg(long = "log", env = "MCP_FUNNEL_LOG", default_value_t = LogLevel::default())]
    pub log_level: LogLevel,
    /// Set the style of log output.
    #[arg(long, env = "MCP_FUNNEL_LOG_STYLE", default_value_t = LogStyle::default())]
    pub log_style: LogStyle,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub(crate) enum LogStyle {
    /// Colorized text, used as the default with TTY output.
    Color,
    /// Standard text, used as the default with non-TTY output.
    Text,
    /// JSON objects.
    Json,
}

impl Default for LogStyle {
    fn default() -> Self {
        if std::io::stderr().is_terminal() {
            LogStyle::Color
        } else {
            LogStyle::Text
        }
    }
}

impl AsRef<str> for LogStyle {
    fn as_ref(&self) -> &str {
        match self {
            LogStyle::Color => "color",
            LogStyle::Text => "text",
            LogStyle::Json => "json",
        }
    }
}

impl fmt::Display for LogStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub(crate) enum LogLevel {
    /// Disable logging.
    Off,
    /// Only log errors.
    Error,
    /// Log errors and warnings.
    Warn,
    /// Log errors, warnings, and info messages.
    #[default]
    Info,
    /// Log errors, warnings, info, and debug messages.
    Debug,
    /// Log everything, including trace messages.
    Trace,
}

impl LogLevel {
    pub fn env_filter(self) -> EnvFilter {
        let filter_str = match self {
            LogLevel::Off => Cow::Borrowed("off"),
            level => Cow::Owned(format!("warn,funnel={level},proxy={level},config={level}")),
        };

        EnvFilter::from_str(&filter_str).expect("these are valid env filters")
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_ref().fmt(f)
    }
}

impl AsRef<str> for LogLevel {
    fn as_ref(&self) -> &str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}
