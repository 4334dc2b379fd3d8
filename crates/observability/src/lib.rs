//! Process-wide tracing/logging setup shared by the API binary and tests.

pub mod tracing;

pub use crate::tracing::LogFormat;

/// Initialize JSON logging filtered by `RUST_LOG` (default `info`).
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init() {
    tracing::init(LogFormat::Json, None);
}

/// Initialize with an explicit format and default filter directive.
pub fn init_with(format: LogFormat, default_filter: Option<&str>) {
    tracing::init(format, default_filter);
}
