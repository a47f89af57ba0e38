/// Verbosity of emitted logs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Structured JSON lines, as collected by the platform log service.
    Json,
    /// Human-readable text.
    Text,
}

#[derive(Debug, Clone, clap::Args)]
pub struct LogArgs {
    /// Level of emitted logs. A RUST_LOG filter takes precedence when set.
    #[clap(long = "log.level", env = "LOG_LEVEL", value_enum, default_value = "info")]
    pub level: LogLevel,
    #[clap(long = "log.format", env = "LOG_FORMAT", value_enum, default_value = "json")]
    pub format: LogFormat,
}

impl Default for LogArgs {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Json,
        }
    }
}

/// Install the global tracing subscriber. Warm starts of the process may call
/// this again, and later calls leave the installed subscriber in place.
pub fn init_logging(args: &LogArgs) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(args.level.as_str()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    let result = match args.format {
        LogFormat::Json => builder
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => builder.with_ansi(false).try_init(),
    };

    if let Err(err) = result {
        tracing::debug!(error = %err, "logging is already initialized");
    }
}

