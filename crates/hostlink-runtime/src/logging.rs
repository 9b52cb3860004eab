//! Console logging setup

use hostlink_core::LogLevel;

/// Install a console subscriber at `level`
///
/// Returns false if a global subscriber was already installed, which is the
/// normal case when several runtimes share one process.
pub fn init_logging(level: LogLevel) -> bool {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::from(level))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .is_ok()
}
