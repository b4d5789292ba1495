//! Script-level view of a single visible raw frame.

use std::fmt;

use crate::{
    filter::VisibilityFilter,
    metadata::{RawFrame, RawLocation, TypeDescriptor},
};

/// Display token for top-level script code.
pub const MAIN_ROUTINE_TOKEN: &str = "{main}";

/// Sigil prefixed to parameter names when rendered.
pub const VARIABLE_SIGIL: char = '$';

/// A zero-based source position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    /// Source file path. Never empty.
    pub file: String,
    /// Zero-based line.
    pub line: u32,
    /// Zero-based column, if the host reported one.
    pub column: Option<u32>,
}

impl Location {
    fn from_raw(raw: &RawLocation) -> Option<Self> {
        let file = raw.file.as_deref().filter(|file| !file.is_empty())?;
        Some(Self {
            file: file.to_owned(),
            line: raw.line.saturating_sub(1),
            column: raw.column.checked_sub(1),
        })
    }
}

impl fmt::Display for Location {
    /// Formats as `file(line,column)`, with `?` standing in for an unknown
    /// column.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({},", self.file, self.line)?;
        match self.column {
            Some(column) => write!(f, "{column})"),
            None => f.write_str("?)"),
        }
    }
}

/// A visible stack frame with its script-level identity resolved.
///
/// All fields are derived once from the raw frame; the raw frame is not kept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    location: Option<Location>,
    routine_name: String,
    type_name: Option<String>,
    is_static: bool,
    is_global_code: bool,
    parameters: Vec<String>,
}

impl Frame {
    /// Derives a frame from `raw`.
    ///
    /// Returns `None` when the raw frame has no routine. Visibility is not
    /// checked here; callers filter first.
    pub fn new(raw: &RawFrame, filter: &VisibilityFilter) -> Option<Self> {
        let routine = raw.routine.as_ref()?;
        let location = raw.location.as_ref().and_then(Location::from_raw);

        if filter.is_global_code(routine) {
            return Some(Self {
                location,
                routine_name: MAIN_ROUTINE_TOKEN.to_owned(),
                type_name: None,
                is_static: true,
                is_global_code: true,
                parameters: Vec::new(),
            });
        }

        let mut parameters = routine.parameters.iter().peekable();
        parameters.next_if(|param| param.is_implicit);

        Some(Self {
            location,
            routine_name: routine.name.clone(),
            type_name: routine
                .declaring_type
                .as_ref()
                .filter(|ty| !presents_as_free_function(ty))
                .map(|ty| ty.name.clone()),
            is_static: routine.is_static,
            is_global_code: false,
            parameters: parameters.map(|param| param.name.clone()).collect(),
        })
    }

    /// The zero-based source position, if known.
    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    /// Returns true if the frame has a source position.
    pub fn has_location(&self) -> bool {
        self.location.is_some()
    }

    /// Source file path, if known.
    pub fn file(&self) -> Option<&str> {
        self.location.as_ref().map(|loc| loc.file.as_str())
    }

    /// Zero-based line, if known.
    pub fn line(&self) -> Option<u32> {
        self.location.as_ref().map(|loc| loc.line)
    }

    /// Zero-based column, if known.
    pub fn column(&self) -> Option<u32> {
        self.location.as_ref().and_then(|loc| loc.column)
    }

    /// Simple routine name; [`MAIN_ROUTINE_TOKEN`] for top-level code.
    pub fn routine_name(&self) -> &str {
        &self.routine_name
    }

    /// Name of the declaring type, or `None` for free functions and top-level
    /// code.
    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    /// Whether the routine is static.
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Whether the frame executes top-level script code.
    pub fn is_global_code(&self) -> bool {
        self.is_global_code
    }

    /// Call operator between type and routine name: `::` or `->`.
    pub fn operator(&self) -> &'static str {
        if self.is_static { "::" } else { "->" }
    }

    /// Declared parameter names without sigils, implicit parameters removed.
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// Routine name qualified by its type when it has one, e.g. `C::bar`.
    pub fn full_name(&self) -> String {
        match &self.type_name {
            Some(type_name) => format!("{type_name}{}{}", self.operator(), self.routine_name),
            None => self.routine_name.clone(),
        }
    }

    /// Parameter list as rendered between parentheses, e.g. `$a, $b`.
    pub fn parameters_string(&self) -> String {
        let mut out = String::new();
        for (i, name) in self.parameters.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push(VARIABLE_SIGIL);
            out.push_str(name);
        }
        out
    }

    /// Writes `full_name(params)`, or the bare token for top-level code.
    pub(crate) fn write_call(&self, f: &mut impl fmt::Write) -> fmt::Result {
        if self.is_global_code {
            return f.write_str(&self.routine_name);
        }
        write!(f, "{}({})", self.full_name(), self.parameters_string())
    }
}

/// Script-marked types and static-only types exported by library extensions
/// are implementation details; their routines read as plain functions.
fn presents_as_free_function(ty: &TypeDescriptor) -> bool {
    ty.is_script_marked || (ty.is_public && ty.is_abstract && ty.module.is_library_extension)
}
