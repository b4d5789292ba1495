//! Decides which raw frames are visible to scripts.
//!
//! The raw stack contains trampolines, compiler-generated helpers and runtime
//! glue. [`VisibilityFilter`] drops those frames before any pairing happens so
//! they never leak into a user-facing trace.

use crate::metadata::{RawFrame, RoutineDescriptor, TypeDescriptor};

/// Signature key token of the runtime's own modules.
pub const RUNTIME_SIGNATURE_KEY: &str = "5b4bee2bf1f98593";

/// Outcome of checking a single raw frame.
///
/// Everything except [`Visibility::Visible`] names the first rule the frame
/// failed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Visibility {
    /// The frame belongs in the trace.
    Visible,
    /// The host could not resolve a routine for the frame.
    NoRoutine,
    /// The routine name is not a legal script identifier.
    SynthesizedName,
    /// The routine lives on the container type of compiled top-level code.
    ScriptContainer,
    /// The routine lives in a trusted runtime module and is not a public
    /// static library routine.
    TrustedInternal,
    /// The routine or its type carries a "hide from diagnostics" marker.
    Hidden,
}

impl Visibility {
    /// Returns true for [`Visibility::Visible`].
    pub fn is_visible(self) -> bool {
        self == Visibility::Visible
    }
}

/// Configuration for filtering raw frames.
///
/// # Examples
///
/// ```rust
/// use phpstack::{
///     VisibilityFilter,
///     metadata::{HideMarkers, RawFrame, RoutineDescriptor},
/// };
///
/// let filter = VisibilityFilter::DEFAULT;
///
/// assert!(filter.is_visible(&RawFrame::new(RoutineDescriptor::new("foo"))));
/// assert!(!filter.is_visible(&RawFrame::new(RoutineDescriptor::new("<foo>b__0"))));
/// assert!(!filter.is_visible(&RawFrame::new(
///     RoutineDescriptor::new("foo").with_markers(HideMarkers {
///         debugger_hidden: true,
///         ..HideMarkers::NONE
///     })
/// )));
/// ```
#[derive(Copy, Clone, Debug)]
pub struct VisibilityFilter {
    /// Name the compiler gives the routine holding a script's top-level code.
    pub global_code_name: &'static str,
    /// Simple name of the type that contains compiled top-level code.
    pub script_container_name: &'static str,
    /// Signature keys of trusted runtime modules. Only public static routines
    /// on public static-only types are visible from these.
    pub trusted_signature_keys: &'static [&'static str],
    /// Keep frames from trusted modules and frames with hide markers. Frames
    /// without a routine, with synthesized names, or on the script container
    /// are still dropped.
    pub show_hidden: bool,
}

impl VisibilityFilter {
    /// Default filter settings.
    pub const DEFAULT: Self = Self {
        global_code_name: "<Main>",
        script_container_name: "<Script>",
        trusted_signature_keys: &[RUNTIME_SIGNATURE_KEY],
        show_hidden: false,
    };

    /// Returns true if `frame` should appear in traces.
    pub fn is_visible(&self, frame: &RawFrame) -> bool {
        self.visibility(frame).is_visible()
    }

    /// Classifies `frame`, naming the first rule it fails.
    pub fn visibility(&self, frame: &RawFrame) -> Visibility {
        let Some(routine) = &frame.routine else {
            return Visibility::NoRoutine;
        };

        if routine.name != self.global_code_name && !is_identifier(&routine.name) {
            return Visibility::SynthesizedName;
        }

        let declaring_type = routine.declaring_type.as_ref();

        if let Some(ty) = declaring_type
            && ty.name == self.script_container_name
        {
            return Visibility::ScriptContainer;
        }

        if self.show_hidden {
            return Visibility::Visible;
        }

        if let Some(ty) = declaring_type
            && self.is_trusted(ty)
            && !is_library_routine(routine, ty)
        {
            return Visibility::TrustedInternal;
        }

        if routine.markers.any() || declaring_type.is_some_and(|ty| ty.markers.any()) {
            return Visibility::Hidden;
        }

        Visibility::Visible
    }

    /// Returns true if the global-code marker names `routine`.
    pub(crate) fn is_global_code(&self, routine: &RoutineDescriptor) -> bool {
        routine.is_static && routine.name == self.global_code_name
    }

    fn is_trusted(&self, ty: &TypeDescriptor) -> bool {
        ty.module
            .signature_key
            .as_deref()
            .is_some_and(|key| self.trusted_signature_keys.contains(&key))
    }
}

impl Default for VisibilityFilter {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Public static routine on a public static-only type: the shape of a
/// built-in library function.
fn is_library_routine(routine: &RoutineDescriptor, ty: &TypeDescriptor) -> bool {
    routine.is_public && routine.is_static && ty.is_public && ty.is_abstract
}

/// Checks the script identifier shape: `[_\p{XID_Start}][\p{XID_Continue}]*`.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first == '_' || unicode_ident::is_xid_start(first)) && chars.all(unicode_ident::is_xid_continue)
}
