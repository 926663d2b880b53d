//! Logging facilities.
//!
//! Every record is prefixed with the simulation time, the colored level name and the component name taken from a
//! [`SimulationContext`](crate::context::SimulationContext), e.g. `[12.000 INFO  balancer] vm #3 is overloaded`.

use atty::Stream;
use colored::{Color, ColoredString, Colorize};
use log::Level;

/// Applies the color to the string if stderr (log) goes to console.
pub fn get_colored(s: &str, color: Color) -> ColoredString {
    if atty::is(Stream::Stderr) {
        s.color(color)
    } else {
        s.normal()
    }
}

/// Returns the padded and colored level label used in log records.
pub fn level_label(level: Level) -> ColoredString {
    match level {
        Level::Error => get_colored("ERROR", Color::Red),
        Level::Warn => get_colored("WARN ", Color::Yellow),
        Level::Info => get_colored("INFO ", Color::Green),
        Level::Debug => get_colored("DEBUG", Color::Blue),
        Level::Trace => get_colored("TRACE", Color::Cyan),
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_with_ctx {
    ($level:expr, $ctx:expr, $msg:expr) => (
        log::log!(
            target: $ctx.name(),
            $level,
            "[{:.3} {} {}] {}",
            $ctx.time(), $crate::log::level_label($level), $ctx.name(), $msg
        )
    );
    ($level:expr, $ctx:expr, $format:expr, $($arg:tt)+) => (
        log::log!(
            target: $ctx.name(),
            $level,
            concat!("[{:.3} {} {}] ", $format),
            $ctx.time(), $crate::log::level_label($level), $ctx.name(), $($arg)+
        )
    );
}

/// Logs a message at the info level.
///
/// # Examples
///
/// ```rust
/// use dslab_balancer::context::SimulationContext;
/// use dslab_balancer::log_info;
///
/// let ctx = SimulationContext::standalone("balancer");
/// log_info!(ctx, "rebalancing {} tasks", 42);
/// ```
#[macro_export]
macro_rules! log_info {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_with_ctx!(log::Level::Info, $ctx, $($arg)+));
}

/// Logs a message at the debug level.
#[macro_export]
macro_rules! log_debug {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_with_ctx!(log::Level::Debug, $ctx, $($arg)+));
}

/// Logs a message at the trace level.
#[macro_export]
macro_rules! log_trace {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_with_ctx!(log::Level::Trace, $ctx, $($arg)+));
}

/// Logs a message at the warn level.
#[macro_export]
macro_rules! log_warn {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_with_ctx!(log::Level::Warn, $ctx, $($arg)+));
}

/// Logs a message at the error level.
#[macro_export]
macro_rules! log_error {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_with_ctx!(log::Level::Error, $ctx, $($arg)+));
}
