//! Tracing subscriber setup shared by the demo binaries and tests.

use tracing::Level;

/// Initialize logging at INFO, overridable through `RUST_LOG`
/// (e.g. `RUST_LOG=arbor_solver=debug` for per-iteration solver detail).
pub fn init_logger() {
    init_logger_with_level(Level::INFO)
}

/// Initialize logging with a custom fallback level.
///
/// `RUST_LOG` still takes precedence when set.
pub fn init_logger_with_level(default_level: Level) {
    use tracing_subscriber::fmt::time::SystemTime;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .with_timer(SystemTime)
        .with_target(true)
        .with_level(true)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();
}
