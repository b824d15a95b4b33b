//! Native log setup. Library code only emits `tracing` events; the host decides where they go.

use tracing_subscriber::{fmt, EnvFilter};

const JSON_ENV: &str = "WALLET_ADAPTERS_LOG_JSON";
/// Quiet dependencies, chatty adapters.
const DEFAULT_DIRECTIVES: &str = "warn,wallet_adapters=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    /// `WALLET_ADAPTERS_LOG_JSON=1` selects JSON lines.
    pub fn from_env() -> Self {
        match std::env::var(JSON_ENV).as_deref() {
            Ok("1") => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }
}

fn filter(default_directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives))
}

/// Installs a stderr subscriber filtered by `RUST_LOG`. Returns false when a global
/// subscriber was already set.
pub fn init_logging_with(format: LogFormat, default_directives: &str) -> bool {
    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter(default_directives))
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().try_init().is_ok(),
        LogFormat::Compact => builder.compact().with_target(true).try_init().is_ok(),
    }
}

pub fn init_logging() {
    init_logging_with(LogFormat::from_env(), DEFAULT_DIRECTIVES);
}
