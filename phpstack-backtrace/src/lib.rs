#![deny(
    missing_docs,
    unsafe_code,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]

//! Native stack capture for the phpstack trace translator.
//!
//! This crate implements [`StackCapture`] over the process's own native stack,
//! so a runtime written in Rust can build script-level traces directly from
//! where it stands.
//!
//! # Quick Start
//!
//! ```rust
//! use phpstack_backtrace::NativeStack;
//!
//! fn example() -> Option<phpstack::Trace> {
//!     NativeStack::new_from_env().capture_trace().ok()
//! }
//!
//! if let Some(trace) = example() {
//!     print!("{trace}");
//! }
//! ```
//!
//! # Mapping native frames
//!
//! Each resolved symbol becomes one [`RawFrame`]:
//!
//! - the routine is the last segment of the demangled path, so closures
//!   (`{{closure}}`) fail the identifier check and are dropped;
//! - a preceding segment that names a type (`Handler::handle`) becomes the
//!   declaring type; a module segment becomes a script-marked container, so
//!   free functions render without a type;
//! - frames from `std`, `core` and `alloc` are signed with the runtime key and
//!   therefore hidden;
//! - frames from the capture machinery itself and foreign frames without a
//!   crate path carry a hide marker;
//! - the `main` function at a crate root is the global-code routine and
//!   renders as `{main}`;
//! - symbols without a source file are left unresolved.
//!
//! # Environment Variables
//!
//! - `RUST_BACKTRACE=full` - Implies `full`
//! - `PHPSTACK_BACKTRACE` - Comma-separated options:
//!   - `full` - Keep hidden and runtime frames and do not limit the frame
//!     count
//!   - `full_paths` - Show full file paths instead of shortened paths

use std::sync::OnceLock;

use backtrace::BytesOrWideString;
use phpstack::{
    Trace, TraceError, VisibilityFilter,
    filter::RUNTIME_SIGNATURE_KEY,
    metadata::{
        HideMarkers, ModuleDescriptor, RawFrame, RoutineDescriptor, StackCapture, TypeDescriptor,
    },
};

/// Crates whose frames are part of the runtime.
const RUNTIME_CRATES: &[&str] = &["std", "core", "alloc"];

/// Crates implementing the capture itself; never shown.
const CAPTURE_CRATES: &[&str] = &["backtrace", "phpstack", "phpstack_backtrace"];

/// Native stack capture configuration.
///
/// # Examples
///
/// ```rust
/// use phpstack::VisibilityFilter;
/// use phpstack_backtrace::NativeStack;
///
/// let capture = NativeStack {
///     filter: VisibilityFilter {
///         show_hidden: true,
///         ..VisibilityFilter::DEFAULT
///     },
///     max_frame_count: 64,
///     show_full_path: true,
/// };
/// let trace = capture.capture_trace();
/// ```
#[derive(Copy, Clone, Debug)]
pub struct NativeStack {
    /// Filter applied when building traces with [`NativeStack::capture_trace`].
    pub filter: VisibilityFilter,
    /// Maximum number of native frames to walk.
    pub max_frame_count: usize,
    /// Whether to keep full file paths for std and registry sources.
    pub show_full_path: bool,
}

impl NativeStack {
    /// Default capture settings.
    pub const DEFAULT: Self = Self {
        filter: VisibilityFilter::DEFAULT,
        max_frame_count: 128,
        show_full_path: false,
    };

    /// Creates a [`NativeStack`] configured from the environment.
    ///
    /// See the crate documentation for the recognised variables.
    pub fn new_from_env() -> Self {
        let env_options = PhpstackEnvOptions::get();
        Self {
            filter: VisibilityFilter {
                show_hidden: env_options.full,
                ..VisibilityFilter::DEFAULT
            },
            max_frame_count: if env_options.full {
                usize::MAX
            } else {
                Self::DEFAULT.max_frame_count
            },
            show_full_path: env_options.show_full_path,
        }
    }

    /// Captures the current native stack and builds a trace from it.
    pub fn capture_trace(&self) -> Result<Trace, TraceError> {
        Trace::capture(self, &self.filter)
    }

    fn raw_frame(
        &self,
        symbol_name: Option<String>,
        filename: Option<BytesOrWideString<'_>>,
        lineno: Option<u32>,
        colno: Option<u32>,
    ) -> RawFrame {
        let (Some(symbol_name), Some(filename)) = (symbol_name, filename) else {
            return RawFrame::unresolved();
        };

        let path = FramePath::new(&filename.to_str_lossy());
        let routine = describe_symbol(
            &symbol_name,
            path.crate_name.as_deref(),
            self.filter.global_code_name,
        );
        let file = match (&path.suffix, self.show_full_path) {
            (Some(suffix), false) => suffix.clone(),
            _ => path.raw_path,
        };

        RawFrame::new(routine).at(file, lineno.unwrap_or(0), colno.unwrap_or(0))
    }
}

impl Default for NativeStack {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl StackCapture for NativeStack {
    fn capture_current_stack(&self) -> Result<Vec<RawFrame>, TraceError> {
        let mut frames = Vec::new();

        backtrace::trace(|frame| {
            backtrace::resolve_frame(frame, |symbol| {
                frames.push(self.raw_frame(
                    symbol.name().map(|sym| format!("{sym:#}")),
                    symbol.filename_raw(),
                    symbol.lineno(),
                    symbol.colno(),
                ));
            });
            frames.len() < self.max_frame_count
        });

        if frames.is_empty() {
            return Err(TraceError::CaptureUnavailable(
                "no native frames could be resolved".to_owned(),
            ));
        }

        tracing::trace!(count = frames.len(), "captured native stack");
        Ok(frames)
    }
}

#[derive(Debug)]
struct PhpstackEnvOptions {
    full: bool,
    show_full_path: bool,
}

impl PhpstackEnvOptions {
    fn get() -> &'static Self {
        static PHPSTACK_FLAGS: OnceLock<PhpstackEnvOptions> = OnceLock::new();

        PHPSTACK_FLAGS.get_or_init(|| {
            let mut full = std::env::var_os("RUST_BACKTRACE").is_some_and(|var| var == "full");
            let mut show_full_path = false;
            if let Some(var) = std::env::var_os("PHPSTACK_BACKTRACE") {
                for v in var.to_string_lossy().split(',') {
                    if v.eq_ignore_ascii_case("full") {
                        full = true;
                    } else if v.eq_ignore_ascii_case("full_paths") {
                        show_full_path = true;
                    }
                }
            }
            PhpstackEnvOptions {
                full,
                show_full_path,
            }
        })
    }
}

/// A source path with the crate it belongs to, when recognisable.
#[derive(Debug, PartialEq, Eq)]
struct FramePath {
    raw_path: String,
    crate_name: Option<String>,
    /// Path below the toolchain or registry prefix.
    suffix: Option<String>,
}

impl FramePath {
    fn new(path: &str) -> Self {
        static REGEXES: OnceLock<[regex::Regex; 2]> = OnceLock::new();
        let [std_regex, registry_regex] = REGEXES.get_or_init(|| {
            [
                // - /lib/rustlib/src/rust/library/{crate}/src/...
                // - /rustc/{40-char-hash}/library/{crate}/src/...
                regex::Regex::new(
                    r"(?:/lib/rustlib/src/rust|^/rustc/[0-9a-f]{40})/library/([a-z_]+)/src/.*$",
                )
                .expect("built-in regex pattern for std library paths should be valid"),
                // - /.cargo/registry/src/{index}-{16-char-hash}/{crate}-{version}/src/...
                regex::Regex::new(
                    r"/\.cargo/registry/src/[^/]+-[0-9a-f]{16}/([^./]+)-[0-9]+\.[^/]*/src/.*$",
                )
                .expect("built-in regex pattern for cargo registry paths should be valid"),
            ]
        });

        let captures = std_regex
            .captures(path)
            .or_else(|| registry_regex.captures(path));

        match captures.and_then(|captures| captures.get(1)) {
            Some(crate_capture) => Self {
                raw_path: path.to_owned(),
                crate_name: Some(crate_capture.as_str().replace('-', "_")),
                suffix: Some(path[crate_capture.start()..].to_owned()),
            },
            None => Self {
                raw_path: path.to_owned(),
                crate_name: None,
                suffix: None,
            },
        }
    }
}

/// Splits a demangled symbol into path segments at top-level `::`.
///
/// Qualified-self prefixes (`<a::Foo as b::Trait>::m`) are replaced by the
/// self type's path and generic arguments are dropped.
fn split_symbol_path(sym: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut angle_nesting_level = 0u64;
    let mut curly_nesting_level = 0u64;
    let mut segment_start = 0usize;
    let mut prev = '\0';

    for (i, c) in sym.char_indices() {
        match c {
            '<' => angle_nesting_level = angle_nesting_level.saturating_add(1),
            '>' if prev != '-' => angle_nesting_level = angle_nesting_level.saturating_sub(1),
            '{' => curly_nesting_level = curly_nesting_level.saturating_add(1),
            '}' => curly_nesting_level = curly_nesting_level.saturating_sub(1),
            ':' if prev == ':' && angle_nesting_level == 0 && curly_nesting_level == 0 => {
                segments.push(&sym[segment_start..i - 1]);
                segment_start = i + 1;
                prev = '\0';
                continue;
            }
            _ => {}
        }
        prev = c;
    }
    segments.push(&sym[segment_start..]);

    let mut resolved = Vec::with_capacity(segments.len());
    for (i, segment) in segments.into_iter().enumerate() {
        if let Some(inner) = segment.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
            if i == 0 {
                let self_ty = inner.split(" as ").next().unwrap_or(inner);
                let self_ty = self_ty
                    .trim_start_matches(['&', '*'])
                    .trim_start_matches("mut ")
                    .trim_start_matches("dyn ");
                resolved.extend(split_symbol_path(self_ty));
            }
            continue;
        }
        let segment = segment.split_once('<').map_or(segment, |(head, _)| head);
        if !segment.is_empty() {
            resolved.push(segment);
        }
    }
    resolved
}

/// Builds the routine descriptor for a demangled native symbol.
fn describe_symbol(
    sym: &str,
    path_crate_name: Option<&str>,
    global_code_name: &str,
) -> RoutineDescriptor {
    let segments = split_symbol_path(sym);
    let Some((&routine_name, parents)) = segments.split_last() else {
        return RoutineDescriptor::new(sym);
    };

    let Some(&parent) = parents.last() else {
        // Foreign symbols carry no crate path.
        return RoutineDescriptor::new(routine_name).with_markers(HideMarkers {
            debugger_hidden: true,
            ..HideMarkers::NONE
        });
    };

    let crate_name = path_crate_name.unwrap_or(parents[0]);
    let mut module = ModuleDescriptor::new(crate_name);
    if RUNTIME_CRATES.contains(&crate_name) {
        module = module.signed_with(RUNTIME_SIGNATURE_KEY);
    }

    let mut declaring_type = TypeDescriptor::new(parent).in_module(module);
    if !parent.starts_with(char::is_uppercase) {
        declaring_type = declaring_type.script_marked();
    }
    if CAPTURE_CRATES.contains(&crate_name) {
        declaring_type = declaring_type.with_markers(HideMarkers {
            stack_trace_hidden: true,
            ..HideMarkers::NONE
        });
    }

    let name = if parents.len() == 1 && routine_name == "main" {
        global_code_name
    } else {
        routine_name
    };

    RoutineDescriptor::new(name).declared_in(declaring_type)
}

#[cfg(test)]
mod tests {
    use phpstack::{Frame, Visibility};

    use super::*;

    const GLOBAL: &str = VisibilityFilter::DEFAULT.global_code_name;

    fn visibility(routine: RoutineDescriptor) -> Visibility {
        VisibilityFilter::DEFAULT.visibility(&RawFrame::new(routine))
    }

    #[test]
    fn test_split_symbol_path() {
        assert_eq!(split_symbol_path("app::server::Handler::handle"), [
            "app", "server", "Handler", "handle"
        ]);
        assert_eq!(split_symbol_path("<app::Foo as core::fmt::Display>::fmt"), [
            "app", "Foo", "fmt"
        ]);
        assert_eq!(split_symbol_path("<&app::Foo as core::fmt::Debug>::fmt"), [
            "app", "Foo", "fmt"
        ]);
        assert_eq!(split_symbol_path("app::main::{{closure}}"), [
            "app",
            "main",
            "{{closure}}"
        ]);
        assert_eq!(split_symbol_path("app::parse::<u32>"), ["app", "parse"]);
        assert_eq!(
            split_symbol_path("alloc::vec::Vec<T,A>::push"),
            ["alloc", "vec", "Vec", "push"]
        );
        assert_eq!(split_symbol_path("__libc_start_main"), ["__libc_start_main"]);
    }

    #[test]
    fn test_method_symbol() {
        let routine = describe_symbol("app::server::Handler::handle", None, GLOBAL);
        let frame = Frame::new(&RawFrame::new(routine.clone()), &VisibilityFilter::DEFAULT)
            .expect("routine is present");
        assert_eq!(frame.full_name(), "Handler::handle");
        assert_eq!(visibility(routine), Visibility::Visible);
    }

    #[test]
    fn test_free_function_symbol() {
        let routine = describe_symbol("app::server::serve", None, GLOBAL);
        let frame = Frame::new(&RawFrame::new(routine), &VisibilityFilter::DEFAULT)
            .expect("routine is present");
        assert_eq!(frame.full_name(), "serve");
        assert_eq!(frame.type_name(), None);
    }

    #[test]
    fn test_crate_main_is_global_code() {
        let routine = describe_symbol("app::main", None, GLOBAL);
        let frame = Frame::new(&RawFrame::new(routine), &VisibilityFilter::DEFAULT)
            .expect("routine is present");
        assert!(frame.is_global_code());
        assert_eq!(frame.routine_name(), "{main}");

        let nested = describe_symbol("app::cli::main", None, GLOBAL);
        assert_eq!(nested.name, "main");
    }

    #[test]
    fn test_runtime_and_capture_frames_are_hidden() {
        assert_eq!(
            visibility(describe_symbol(
                "core::ops::function::FnOnce::call_once",
                None,
                GLOBAL
            )),
            Visibility::TrustedInternal
        );
        assert_eq!(
            visibility(describe_symbol("std::rt::lang_start_internal", None, GLOBAL)),
            Visibility::TrustedInternal
        );
        assert_eq!(
            visibility(describe_symbol(
                "phpstack_backtrace::NativeStack::capture_trace",
                None,
                GLOBAL
            )),
            Visibility::Hidden
        );
        assert_eq!(
            visibility(describe_symbol("__libc_start_main", None, GLOBAL)),
            Visibility::Hidden
        );
        assert_eq!(
            visibility(describe_symbol("app::main::{{closure}}", None, GLOBAL)),
            Visibility::SynthesizedName
        );
    }

    #[test]
    fn test_path_crate_overrides_symbol_crate() {
        let routine = describe_symbol("tokio::runtime::Runtime::block_on", Some("std"), GLOBAL);
        assert_eq!(visibility(routine), Visibility::TrustedInternal);
    }

    #[test]
    fn test_frame_path() {
        let std_path = FramePath::new(
            "/rustc/0123456789abcdef0123456789abcdef01234567/library/core/src/ops/function.rs",
        );
        assert_eq!(std_path.crate_name.as_deref(), Some("core"));
        assert_eq!(std_path.suffix.as_deref(), Some("core/src/ops/function.rs"));

        let registry_path = FramePath::new(
            "/home/user/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/tokio-1.48.0/src/runtime/mod.rs",
        );
        assert_eq!(registry_path.crate_name.as_deref(), Some("tokio"));
        assert_eq!(
            registry_path.suffix.as_deref(),
            Some("tokio-1.48.0/src/runtime/mod.rs")
        );

        let local_path = FramePath::new("/build/src/main.rs");
        assert_eq!(local_path, FramePath {
            raw_path: "/build/src/main.rs".to_owned(),
            crate_name: None,
            suffix: None,
        });
    }

    #[test]
    fn test_unresolved_symbols() {
        let frame = NativeStack::DEFAULT.raw_frame(None, None, Some(3), None);
        assert_eq!(frame, RawFrame::unresolved());
    }
}
