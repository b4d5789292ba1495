//! Pairs adjacent frames into trace lines.
//!
//! A script-level trace reports, for each level, where a call was made and what
//! was called. The location comes from one frame and the callee from the next
//! more recent one, so `N` frames produce `N + 1` lines:
//!
//! ```text
//! frames:  [0: foo @ a.php:10]  [1: C::bar @ a.php:20]  [2: {main}]
//!
//! order -1: a.php(9,?)                 capture point, never listed
//! order  0: a.php(19,?): foo()
//! order  1: C::bar()                   frame 2 has no location
//! order  2: {main}                     no location frame left
//! ```

use std::fmt;

use crate::frame::Frame;

/// One line of a script-level trace.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Line<'a> {
    order: isize,
    location_frame: Option<&'a Frame>,
    called_frame: Option<&'a Frame>,
}

impl<'a> Line<'a> {
    /// Position in the rendered trace. The capture point has order `-1`.
    pub fn order(&self) -> isize {
        self.order
    }

    /// Frame supplying the file, line and column.
    pub fn location_frame(&self) -> Option<&'a Frame> {
        self.location_frame
    }

    /// Frame supplying the called routine.
    pub fn called_frame(&self) -> Option<&'a Frame> {
        self.called_frame
    }

    /// Returns true if the location frame has a source position.
    pub fn has_location(&self) -> bool {
        self.location_frame.is_some_and(Frame::has_location)
    }

    /// Writes this line without a trailing newline.
    ///
    /// With `numbered` set, the line is prefixed with `#<order> `. The location
    /// clause and the `: name(params)` clause are each dropped when absent.
    pub fn write_trace_line(&self, f: &mut impl fmt::Write, numbered: bool) -> fmt::Result {
        if numbered {
            write!(f, "#{} ", self.order)?;
        }

        let location = self.location_frame.and_then(Frame::location);
        if let Some(location) = location {
            write!(f, "{location}")?;
        }

        if let Some(called) = self.called_frame {
            if location.is_some() {
                f.write_str(": ")?;
            }
            called.write_call(f)?;
        }

        Ok(())
    }
}

impl fmt::Display for Line<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_trace_line(f, self.order >= 0)
    }
}

/// Builds the `frames.len() + 1` lines of a trace, ordered `-1..frames.len()`.
pub fn build_lines(frames: &[Frame]) -> Vec<Line<'_>> {
    (0..=frames.len())
        .map(|i| Line {
            order: i as isize - 1,
            location_frame: frames.get(i),
            called_frame: i.checked_sub(1).and_then(|prev| frames.get(prev)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        VisibilityFilter,
        metadata::{RawFrame, RoutineDescriptor},
    };

    fn frames(names: &[&str]) -> Vec<Frame> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let raw = RawFrame::new(RoutineDescriptor::new(*name)).at("a.php", i as u32 + 1, 0);
                Frame::new(&raw, &VisibilityFilter::DEFAULT).expect("frame has a routine")
            })
            .collect()
    }

    #[test]
    fn test_empty_stack_yields_single_line() {
        let lines = build_lines(&[]);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].order(), -1);
        assert!(lines[0].location_frame().is_none());
        assert!(lines[0].called_frame().is_none());
        assert_eq!(lines[0].to_string(), "");
    }

    #[test]
    fn test_offset_pairing() {
        for n in 0..6 {
            let frames = frames(&["a", "b", "c", "d", "e", "f"][..n]);
            let lines = build_lines(&frames);
            assert_eq!(lines.len(), n + 1);

            for (i, line) in lines.iter().enumerate() {
                assert_eq!(line.order(), i as isize - 1);
                assert_eq!(line.location_frame(), frames.get(i));
                if i == 0 {
                    assert!(line.called_frame().is_none());
                } else {
                    assert_eq!(line.called_frame(), Some(&frames[i - 1]));
                }
            }
            assert!(lines[n].location_frame().is_none());
        }
    }

    #[test]
    fn test_trace_line_clauses() {
        let frames = frames(&["foo", "bar"]);
        let lines = build_lines(&frames);

        assert_eq!(lines[0].to_string(), "a.php(0,?)");
        assert_eq!(lines[1].to_string(), "#0 a.php(1,?): foo()");
        assert_eq!(lines[2].to_string(), "#1 bar()");

        let mut unnumbered = String::new();
        lines[1]
            .write_trace_line(&mut unnumbered, false)
            .expect("writing to a String cannot fail");
        assert_eq!(unnumbered, "a.php(1,?): foo()");
    }
}
