//! The [`Trace`] captured for one error-reporting event.

use std::fmt;

use crate::{
    TraceError,
    filter::{Visibility, VisibilityFilter},
    frame::Frame,
    line::{Line, build_lines},
    metadata::{RawFrame, StackCapture},
    render::{self, BacktraceRecord},
};

/// A script-level call stack.
///
/// Holds the visible frames of one capture, most recent call first. Lines are
/// derived from the frames on demand; nothing is mutated after construction.
///
/// # Examples
///
/// ```rust
/// use phpstack::{
///     Trace, VisibilityFilter,
///     metadata::{RawFrame, RoutineDescriptor, TypeDescriptor},
/// };
///
/// let trace = Trace::from_raw(
///     [
///         RawFrame::new(RoutineDescriptor::new("foo")).at("a.php", 10, 0),
///         RawFrame::new(RoutineDescriptor::new("bar").declared_in(TypeDescriptor::new("C")))
///             .at("a.php", 20, 0),
///         RawFrame::new(RoutineDescriptor::new("<Main>")),
///     ],
///     &VisibilityFilter::DEFAULT,
/// );
///
/// assert_eq!(trace.current_file(), "a.php");
/// assert_eq!(
///     trace.to_trace_string(),
///     "#0 a.php(19,?): foo()\n#1 C::bar()\n#2 {main}\n"
/// );
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Trace {
    frames: Vec<Frame>,
}

impl Trace {
    /// Captures the calling thread's stack through `capture` and filters it.
    pub fn capture(
        capture: &impl StackCapture,
        filter: &VisibilityFilter,
    ) -> Result<Self, TraceError> {
        let raw = capture.capture_current_stack().inspect_err(|error| {
            tracing::warn!(%error, "stack capture failed");
        })?;
        Ok(Self::from_raw(raw, filter))
    }

    /// Builds a trace from an already captured stack, most recent call first.
    pub fn from_raw(raw: impl IntoIterator<Item = RawFrame>, filter: &VisibilityFilter) -> Self {
        let mut raw_count = 0usize;
        let frames: Vec<Frame> = raw
            .into_iter()
            .inspect(|_| raw_count += 1)
            .filter_map(|raw| match filter.visibility(&raw) {
                Visibility::Visible => Frame::new(&raw, filter),
                reason => {
                    tracing::trace!(
                        routine = ?raw.routine.as_ref().map(|r| r.name.as_str()),
                        ?reason,
                        "dropping frame"
                    );
                    None
                }
            })
            .collect();

        tracing::debug!(raw_count, visible = frames.len(), "built trace");
        Self { frames }
    }

    /// Visible frames, most recent call first.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// The trace lines, ordered `-1..frames().len()`.
    pub fn lines(&self) -> Vec<Line<'_>> {
        build_lines(&self.frames)
    }

    /// File of the capture point, or an empty string when unknown.
    pub fn current_file(&self) -> &str {
        self.frames.first().and_then(Frame::file).unwrap_or_default()
    }

    /// Zero-based line of the capture point, or `0` when unknown.
    pub fn current_line(&self) -> u32 {
        self.frames.first().and_then(Frame::line).unwrap_or_default()
    }

    /// Zero-based column of the capture point, if known.
    pub fn current_column(&self) -> Option<u32> {
        self.frames.first().and_then(Frame::column)
    }

    /// Renders the numbered trace, one line per call.
    pub fn to_trace_string(&self) -> String {
        render::trace_string(&self.lines())
    }

    /// Structured records starting at line `skip`, at most `limit` of them.
    ///
    /// Fails with [`TraceError::InvalidArgument`] if `skip` is negative.
    pub fn backtrace(
        &self,
        skip: i64,
        limit: Option<usize>,
    ) -> Result<Vec<BacktraceRecord>, TraceError> {
        render::backtrace_records(&self.lines(), skip, limit)
    }

    /// Renders an uncaught-exception banner for this trace.
    pub fn exception_banner(&self, identifier: &str, message: &str) -> String {
        render::exception_banner(&self.lines(), identifier, message)
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_trace_string())
    }
}
