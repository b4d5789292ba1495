#![deny(
    missing_docs,
    unsafe_code,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]
// Make docs.rs generate better docs
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Script-level call stacks reconstructed from raw runtime frames.
//!
//! A runtime that hosts a dynamic scripting language captures its own native
//! stack when an error is raised or a script asks for a backtrace. That stack
//! is full of frames scripts must never see (trampolines, compiler-generated
//! helpers, runtime glue), and its pairing of locations to routines does not
//! match what the scripting language reports. This crate translates it.
//!
//! ## Pipeline
//!
//! 1. The host captures [`RawFrame`]s, most recent call first, through a
//!    [`StackCapture`] implementation (see the `phpstack-backtrace` crate for
//!    one built on native backtraces).
//! 2. [`VisibilityFilter`] drops frames that are not script-visible.
//! 3. Each surviving frame becomes a [`Frame`] with its script-level identity
//!    resolved: `{main}` for top-level code, `Class::method` or
//!    `Class->method` for methods, plain names for functions.
//! 4. [`build_lines`] pairs each frame's location with the routine called from
//!    it, giving `N + 1` [`Line`]s for `N` frames.
//! 5. The renderers in [`render`] produce structured backtrace records, the
//!    numbered trace string, and the uncaught-exception banner.
//!
//! ## Quick Example
//!
//! ```
//! use phpstack::{
//!     Trace, VisibilityFilter,
//!     metadata::{RawFrame, RoutineDescriptor},
//! };
//!
//! let trace = Trace::from_raw(
//!     [
//!         RawFrame::new(RoutineDescriptor::new("divide").with_parameter("a"))
//!             .at("math.php", 4, 12),
//!         RawFrame::new(RoutineDescriptor::new("<Main>")).at("index.php", 9, 1),
//!     ],
//!     &VisibilityFilter::DEFAULT,
//! );
//!
//! assert_eq!(
//!     trace.exception_banner("DivisionByZeroError", "Division by zero"),
//!     "DivisionByZeroError: Division by zero in math.php(3,11)\n\
//!      Stack trace:\n\
//!      #0 index.php(8,0): divide($a)\n\
//!      #1 {main}\n"
//! );
//! ```
//!
//! ## Positions
//!
//! Hosts report 1-based lines and columns. Frames store them zero-based. A
//! column the host does not know is `None` and renders as `?`.
//!
//! [`RawFrame`]: metadata::RawFrame
//! [`StackCapture`]: metadata::StackCapture

mod error;
pub mod filter;
pub mod frame;
pub mod line;
pub mod metadata;
pub mod render;
mod trace;

pub use self::{
    error::TraceError,
    filter::{Visibility, VisibilityFilter},
    frame::{Frame, Location},
    line::{Line, build_lines},
    render::{BacktraceRecord, RecordValue},
    trace::Trace,
};
