//! Tracing initialisation driven by the `[log]` settings section.

use tracing::Level;

use crate::config::LogSettings;

/// Parse a level name, accepting `warning` as a synonym for `warn`.
pub fn parse_level(name: &str) -> Option<Level> {
    match name.trim().to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

/// Install the global `fmt` subscriber. Safe to call more than once; later
/// calls are ignored.
pub fn init(settings: &LogSettings) {
    let level = parse_level(&settings.level);

    let _ = tracing_subscriber::fmt()
        .with_max_level(level.unwrap_or(Level::INFO))
        .with_target(settings.with_target)
        .with_ansi(settings.ansi)
        .try_init();

    if level.is_none() {
        tracing::warn!(level = %settings.level, "unknown log level, using info");
    }
}
