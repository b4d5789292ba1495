//! Renders a built line sequence in the three forms scripts consume.
//!
//! - [`backtrace_records`]: one structured record per call, for a script's
//!   backtrace function.
//! - [`trace_string`]: the numbered multi-line trace.
//! - [`exception_banner`]: identifier, message, capture point and trace in
//!   one string.
//!
//! All renderers are pure and may be called any number of times on the same
//! lines.

use std::fmt::{self, Write};

use indexmap::IndexMap;

use crate::{TraceError, line::Line};

/// A value stored in a [`BacktraceRecord`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordValue {
    /// A string value.
    String(String),
    /// An integer value.
    Int(i64),
}

impl fmt::Display for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordValue::String(s) => f.write_str(s),
            RecordValue::Int(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for RecordValue {
    fn from(value: &str) -> Self {
        RecordValue::String(value.to_owned())
    }
}

impl From<u32> for RecordValue {
    fn from(value: u32) -> Self {
        RecordValue::Int(i64::from(value))
    }
}

/// One entry of a structured backtrace.
///
/// Keys keep insertion order: `file`, `line`, `column`, `function`, `class`,
/// `type`. Keys without a value are absent rather than null. Argument values
/// are never included; they are not observable from frame metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BacktraceRecord {
    entries: IndexMap<&'static str, RecordValue>,
}

impl BacktraceRecord {
    fn insert(&mut self, key: &'static str, value: impl Into<RecordValue>) {
        self.entries.insert(key, value.into());
    }

    /// Looks up a key.
    pub fn get(&self, key: &str) -> Option<&RecordValue> {
        self.entries.get(key)
    }

    /// Returns true if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    /// Key-value pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &RecordValue)> + '_ {
        self.entries.iter().map(|(key, value)| (*key, value))
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the record has no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn from_line(line: &Line<'_>) -> Self {
        let mut record = Self::default();

        if let Some(location) = line.location_frame().and_then(|frame| frame.location()) {
            record.insert("file", location.file.as_str());
            record.insert("line", location.line);
            if let Some(column) = location.column {
                record.insert("column", column);
            }
        }

        if let Some(called) = line.called_frame() {
            record.insert("function", called.routine_name());
            if let Some(type_name) = called.type_name() {
                record.insert("class", type_name);
                record.insert("type", called.operator());
            }
        }

        record
    }
}

/// Builds structured records for lines with order `>= skip`, excluding the
/// final location-less line, stopping after `limit` records.
///
/// Fails with [`TraceError::InvalidArgument`] if `skip` is negative.
pub fn backtrace_records(
    lines: &[Line<'_>],
    skip: i64,
    limit: Option<usize>,
) -> Result<Vec<BacktraceRecord>, TraceError> {
    let skip = usize::try_from(skip).map_err(|_| TraceError::InvalidArgument {
        argument: "skip",
        value: skip,
    })?;

    // lines[0] is the capture point and the last line has no location.
    let listed = lines.len().saturating_sub(1);
    Ok(lines
        .get(1..listed)
        .unwrap_or_default()
        .iter()
        .skip(skip)
        .take(limit.unwrap_or(usize::MAX))
        .map(BacktraceRecord::from_line)
        .collect())
}

/// Renders every line except the capture point, one per output line.
pub fn trace_string(lines: &[Line<'_>]) -> String {
    trace_string_from(lines, 0)
}

/// Like [`trace_string`], additionally skipping the first `start` listed
/// lines.
pub fn trace_string_from(lines: &[Line<'_>], start: usize) -> String {
    let mut out = String::new();
    // Writing into a String is infallible.
    let _ = write_listed_lines(&mut out, lines.iter().skip(1 + start));
    out
}

/// Renders `<identifier>: <message> in <capture point>` followed by the
/// trace under a `Stack trace:` header.
///
/// The message clause is dropped when `message` is empty, the location clause
/// when the capture point has no location, and the trace section when there
/// are no lines beyond the capture point.
pub fn exception_banner(lines: &[Line<'_>], identifier: &str, message: &str) -> String {
    let mut out = String::new();
    // Writing into a String is infallible.
    let _ = write_banner(&mut out, lines, identifier, message);
    out
}

fn write_banner(
    out: &mut String,
    lines: &[Line<'_>],
    identifier: &str,
    message: &str,
) -> fmt::Result {
    out.push_str(identifier);
    if !message.is_empty() {
        write!(out, ": {message}")?;
    }

    let Some((first, rest)) = lines.split_first() else {
        return Ok(());
    };

    if first.has_location() {
        out.push_str(" in ");
        first.write_trace_line(out, false)?;
    }

    if !rest.is_empty() {
        out.push('\n');
        out.push_str("Stack trace:\n");
        write_listed_lines(out, rest.iter())?;
    }

    Ok(())
}

fn write_listed_lines<'l, 'a: 'l>(
    out: &mut String,
    lines: impl Iterator<Item = &'l Line<'a>>,
) -> fmt::Result {
    for line in lines {
        line.write_trace_line(out, true)?;
        out.push('\n');
    }
    Ok(())
}
