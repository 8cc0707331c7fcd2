//! Build-time configuration.
//!
//! Values come from environment variables read when the crate is compiled,
//! parsed in `const` context so a bad value never costs anything at runtime.
//!
//! | Variable | Values | Default |
//! |----------|--------|---------|
//! | `LANTERN_LOG_LEVEL` | `fatal` .. `trace` | `debug` |
//! | `LANTERN_AUTOSTART_BUILTIN` | `1`, `true`, `yes` | off |

use lantern_core::log::LogLevel;

/// Most verbose log level delivered to the sink.
pub const MAX_LOG_LEVEL: LogLevel = match option_env!("LANTERN_LOG_LEVEL") {
    Some(name) => match LogLevel::from_name(name) {
        Some(level) => level,
        None => LogLevel::Debug,
    },
    None => LogLevel::Debug,
};

/// Whether built-in drivers start as soon as they are installed.
pub const AUTOSTART_BUILTIN: bool = match option_env!("LANTERN_AUTOSTART_BUILTIN") {
    Some(value) => matches!(value.as_bytes(), b"1" | b"true" | b"yes"),
    None => false,
};
