use tracing_subscriber::{fmt, EnvFilter};

/// Logs go to stderr: stdout carries responses in the stdio host.
/// `LEDGER_BRIDGE_LOG_JSON=1` switches to JSON lines.
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let use_json = std::env::var("LEDGER_BRIDGE_LOG_JSON")
        .map(|value| value == "1")
        .unwrap_or(false);

    let builder = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);
    let _ = if use_json { builder.json().try_init() } else { builder.compact().try_init() };
}
