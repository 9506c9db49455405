//! Logging setup shared by the cassback crates
//!
//! Output goes to stderr through `emit_term`. The level comes from the
//! `CASSBACK_LOG` environment variable:
//! - `off` (default) - nothing is written
//! - `error`, `warn`, `info` - progressively more detail
//! - `debug` - per-chunk and per-entry diagnostics

use std::sync::Once;

// Re-export emit so the macros below resolve in dependent crates
pub use emit;

/// Environment variable consulted by [`init_diagnostics`].
pub const LOG_ENV: &str = "CASSBACK_LOG";

static INIT: Once = Once::new();

/// Parsed value of `CASSBACK_LOG`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Off,
    Error,
    Warn,
    Info,
    Debug,
}

impl Verbosity {
    /// Parse a level name, case-insensitively. Returns `None` for unknown names.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "off" | "" => Some(Self::Off),
            "error" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            _ => None,
        }
    }

    fn min_level(self) -> Option<emit::Level> {
        match self {
            Self::Off => None,
            Self::Error => Some(emit::Level::Error),
            Self::Warn => Some(emit::Level::Warn),
            Self::Info => Some(emit::Level::Info),
            Self::Debug => Some(emit::Level::Debug),
        }
    }
}

/// Initialize diagnostics from `CASSBACK_LOG`.
///
/// Call once at startup; later calls are ignored.
pub fn init_diagnostics() {
    INIT.call_once(|| {
        let raw = std::env::var(LOG_ENV).unwrap_or_else(|_| "off".to_string());
        let (verbosity, unknown) = match Verbosity::parse(&raw) {
            Some(v) => (v, false),
            None => (Verbosity::Info, true),
        };

        let Some(level) = verbosity.min_level() else {
            return;
        };

        let rt = emit::setup()
            .emit_to(emit_term::stderr())
            .emit_when(emit::level::min_filter(level))
            .init();

        if unknown {
            emit::warn!("Unknown {var} value {raw}, using info", var: LOG_ENV, raw: raw);
        }

        // The runtime lives for the rest of the process
        std::mem::forget(rt);
    });
}

/// Log operator-visible progress (files uploaded, objects restored, tool output).
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

/// Log per-entry and per-chunk detail.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

/// Log conditions that do not stop the operation, such as best-effort cleanup failures.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

/// Log failures that abort the operation.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}
