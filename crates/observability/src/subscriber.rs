//! JSON `tracing` subscriber with an environment-driven filter.

use tracing_subscriber::EnvFilter;

/// Filter directive for `default_level`. Unknown levels fall back to `info`.
pub fn filter_directive(default_level: &str) -> &'static str {
    match default_level.trim().to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    }
}

pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(default_level)));

    // JSON logs + timestamps, RUST_LOG wins over the default level.
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(default_level = filter_directive(default_level), "logging initialized");
    }
}
