//! Process-wide logging setup.

/// Subscriber construction (filters, layers).
pub mod subscriber;

pub use subscriber::filter_directive;

/// Initialize structured logging with `default_level` unless `RUST_LOG` is set.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init(default_level: &str) {
    subscriber::init(default_level);
}
