//! Error conditions raised while capturing or rendering a trace.

/// Errors produced by trace capture and the backtrace accessor.
///
/// Rendering is otherwise total: missing locations, missing types and empty
/// stacks degrade to omitted fields instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TraceError {
    /// An argument was outside its accepted range.
    #[error("argument `{argument}` must be greater than or equal to 0, got {value}")]
    InvalidArgument {
        /// Name of the offending argument.
        argument: &'static str,
        /// The rejected value.
        value: i64,
    },
    /// The host could not capture its call stack.
    #[error("stack capture is unavailable: {0}")]
    CaptureUnavailable(String),
}
