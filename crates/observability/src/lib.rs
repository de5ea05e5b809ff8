//! Tracing and logging setup shared by binaries and test harnesses that embed
//! the inventory core.
//!
//! Library crates only emit `tracing` events; installing a subscriber is the
//! embedding application's job, done once through this crate.

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use crate::tracing::LogFormat;

/// Initialize process-wide logging with JSON output.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(LogFormat::Json);
}

/// Initialize process-wide logging with an explicit output format.
pub fn init_with(format: LogFormat) {
    tracing::init(format);
}
