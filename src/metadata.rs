//! Descriptor bundles supplied by the host runtime for each raw frame.
//!
//! The host owns stack capture and reflection. It hands this crate a list of
//! [`RawFrame`]s, most recent call first, each carrying whatever metadata the
//! host could resolve. Any of it may be missing.
//!
//! # Examples
//!
//! ```rust
//! use phpstack::metadata::{RawFrame, RoutineDescriptor, TypeDescriptor};
//!
//! let frame = RawFrame::new(
//!     RoutineDescriptor::new("handle")
//!         .instance()
//!         .declared_in(TypeDescriptor::new("Controller")),
//! )
//! .at("src/Controller.php", 42, 9);
//!
//! assert_eq!(frame.routine.as_ref().map(|r| r.name.as_str()), Some("handle"));
//! ```

use crate::TraceError;

/// The two "hide from diagnostics" markers a routine or type may carry.
///
/// Either marker hides the frame unconditionally.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct HideMarkers {
    /// The debugger-hidden marker.
    pub debugger_hidden: bool,
    /// The stack-trace-hidden marker.
    pub stack_trace_hidden: bool,
}

impl HideMarkers {
    /// No markers present.
    pub const NONE: Self = Self {
        debugger_hidden: false,
        stack_trace_hidden: false,
    };

    /// Returns true if either marker is present.
    pub fn any(self) -> bool {
        self.debugger_hidden || self.stack_trace_hidden
    }
}

/// Identity of the module (assembly) a type was loaded from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModuleDescriptor {
    /// Module name.
    pub name: String,
    /// Public signature key token, if the module is signed.
    pub signature_key: Option<String>,
    /// Whether the module is marked as a library extension. Public static-only
    /// types from such modules surface as free functions.
    pub is_library_extension: bool,
}

impl ModuleDescriptor {
    /// Creates an unsigned, non-extension module descriptor.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            signature_key: None,
            is_library_extension: false,
        }
    }

    /// Sets the signature key token.
    pub fn signed_with(mut self, key: impl Into<String>) -> Self {
        self.signature_key = Some(key.into());
        self
    }

    /// Marks the module as a library extension.
    pub fn library_extension(mut self) -> Self {
        self.is_library_extension = true;
        self
    }
}

/// Metadata about the type declaring a routine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeDescriptor {
    /// Simple (unqualified) type name.
    pub name: String,
    /// Whether the type is publicly visible.
    pub is_public: bool,
    /// Whether the type is abstract. Public abstract types with static members
    /// are how hosts express static-only library classes.
    pub is_abstract: bool,
    /// Whether the type carries the "top-level script" marker.
    pub is_script_marked: bool,
    /// Diagnostic markers on the type.
    pub markers: HideMarkers,
    /// The module the type lives in.
    pub module: ModuleDescriptor,
}

impl TypeDescriptor {
    /// Creates a public, concrete, unmarked type in an anonymous module.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_public: true,
            is_abstract: false,
            is_script_marked: false,
            markers: HideMarkers::NONE,
            module: ModuleDescriptor::default(),
        }
    }

    /// Marks the type as non-public.
    pub fn private(mut self) -> Self {
        self.is_public = false;
        self
    }

    /// Marks the type as abstract (static-only).
    pub fn static_only(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Marks the type as the container of top-level script code.
    pub fn script_marked(mut self) -> Self {
        self.is_script_marked = true;
        self
    }

    /// Replaces the type's diagnostic markers.
    pub fn with_markers(mut self, markers: HideMarkers) -> Self {
        self.markers = markers;
        self
    }

    /// Sets the owning module.
    pub fn in_module(mut self, module: ModuleDescriptor) -> Self {
        self.module = module;
        self
    }
}

/// A declared routine parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParameterDescriptor {
    /// Parameter name without any sigil.
    pub name: String,
    /// Whether the compiler injected this parameter (context, late static
    /// binding, etc.); such parameters never appear in source signatures.
    pub is_implicit: bool,
}

/// Metadata about the routine a raw frame is executing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutineDescriptor {
    /// Declared routine name.
    pub name: String,
    /// Whether the routine is static.
    pub is_static: bool,
    /// Whether the routine is publicly visible.
    pub is_public: bool,
    /// Declared parameters in order.
    pub parameters: Vec<ParameterDescriptor>,
    /// Diagnostic markers on the routine.
    pub markers: HideMarkers,
    /// The declaring type, if the host could resolve one.
    pub declaring_type: Option<TypeDescriptor>,
}

impl RoutineDescriptor {
    /// Creates a public static routine with no parameters and no declaring
    /// type.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_static: true,
            is_public: true,
            parameters: Vec::new(),
            markers: HideMarkers::NONE,
            declaring_type: None,
        }
    }

    /// Marks the routine as an instance method.
    pub fn instance(mut self) -> Self {
        self.is_static = false;
        self
    }

    /// Marks the routine as non-public.
    pub fn private(mut self) -> Self {
        self.is_public = false;
        self
    }

    /// Appends a source-visible parameter.
    pub fn with_parameter(mut self, name: impl Into<String>) -> Self {
        self.parameters.push(ParameterDescriptor {
            name: name.into(),
            is_implicit: false,
        });
        self
    }

    /// Appends a compiler-injected parameter.
    pub fn with_implicit_parameter(mut self, name: impl Into<String>) -> Self {
        self.parameters.push(ParameterDescriptor {
            name: name.into(),
            is_implicit: true,
        });
        self
    }

    /// Replaces the routine's diagnostic markers.
    pub fn with_markers(mut self, markers: HideMarkers) -> Self {
        self.markers = markers;
        self
    }

    /// Sets the declaring type.
    pub fn declared_in(mut self, declaring_type: TypeDescriptor) -> Self {
        self.declaring_type = Some(declaring_type);
        self
    }
}

/// Source position reported by the host's debug metadata.
///
/// Lines and columns are 1-based; `0` means the host did not report one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawLocation {
    /// Source file path.
    pub file: Option<String>,
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number, or `0` when unknown.
    pub column: u32,
}

/// One frame of a captured runtime stack.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawFrame {
    /// The routine the frame executes, if resolvable.
    pub routine: Option<RoutineDescriptor>,
    /// Source position, if debug metadata is present.
    pub location: Option<RawLocation>,
}

impl RawFrame {
    /// Creates a frame for `routine` without location metadata.
    pub fn new(routine: RoutineDescriptor) -> Self {
        Self {
            routine: Some(routine),
            location: None,
        }
    }

    /// Creates a frame whose routine could not be resolved.
    pub fn unresolved() -> Self {
        Self::default()
    }

    /// Attaches a 1-based source position. Pass `0` as `column` when unknown.
    pub fn at(mut self, file: impl Into<String>, line: u32, column: u32) -> Self {
        self.location = Some(RawLocation {
            file: Some(file.into()),
            line,
            column,
        });
        self
    }
}

/// A facility able to capture the calling thread's stack.
///
/// Implementations must capture synchronously: the stack no longer exists once
/// control returns past the capturing frame.
pub trait StackCapture {
    /// Captures the current stack, most recent call first.
    fn capture_current_stack(&self) -> Result<Vec<RawFrame>, TraceError>;
}

impl<F> StackCapture for F
where
    F: Fn() -> Result<Vec<RawFrame>, TraceError>,
{
    fn capture_current_stack(&self) -> Result<Vec<RawFrame>, TraceError> {
        self()
    }
}
