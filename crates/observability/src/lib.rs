//! Process-wide tracing setup shared by every binary.

/// Subscriber initialization (filters, output format).
pub mod tracing;

pub use crate::tracing::LogFormat;

/// Initialize process-wide tracing with the format chosen by
/// `STRATA_LOG_FORMAT` (JSON when unset).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init_with(LogFormat::from_env());
}

/// Initialize process-wide tracing with an explicit output format.
pub fn init_with(format: LogFormat) {
    tracing::init_with(format);
}
