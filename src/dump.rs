//! Human-readable tree rendering of a message, for diagnostics.
//!
//! One line per non-empty leaf, prefixed with its address:
//!
//! ```text
//! -------- Message --------
//! MSH
//!   MSH.3 = LAB
//!   MSH.9.1 = ORU
//! PID
//!   PID.3[2].1 = 456
//! ---------- End ----------
//! ```

use crate::delimiters::HEADER_SEGMENT;
use crate::message::Message;
use crate::segment::{Field, Segment};
use std::fmt;

/// Display adapter returned by [`Message::tree`].
pub struct Tree<'a> {
    message: &'a Message,
}

impl Message {
    pub fn tree(&self) -> Tree<'_> {
        Tree { message: self }
    }
}

impl fmt::Display for Tree<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "-------- Message --------")?;
        for seg in self.message.segments() {
            write_segment(f, seg)?;
        }
        writeln!(f, "---------- End ----------")
    }
}

fn write_segment(f: &mut fmt::Formatter<'_>, seg: &Segment) -> fmt::Result {
    writeln!(f, "{}", seg.name())?;
    let mut rep = 0;
    let mut prev = None;
    for field in seg.fields().iter().filter(|fl| fl.seq() > 0) {
        rep = if prev == Some(field.seq()) { rep + 1 } else { 0 };
        prev = Some(field.seq());
        let addr = if rep == 0 {
            format!("{}.{}", seg.name(), field.seq())
        } else {
            format!("{}.{}[{}]", seg.name(), field.seq(), rep + 1)
        };
        // delimiter fields are never split
        if seg.name() == HEADER_SEGMENT && field.seq() <= 2 {
            writeln!(f, "  {} = {}", addr, field.text(seg.delimiters()))?;
            continue;
        }
        write_field(f, &addr, field)?;
    }
    Ok(())
}

fn write_field(f: &mut fmt::Formatter<'_>, addr: &str, field: &Field) -> fmt::Result {
    let comps = field.components();
    for (ci, comp) in comps.iter().enumerate() {
        let subs = comp.subcomponents();
        for (si, sub) in subs.iter().enumerate() {
            if sub.value().is_empty() {
                continue;
            }
            match (comps.len(), subs.len()) {
                (1, 1) => writeln!(f, "  {} = {}", addr, sub.value())?,
                (_, 1) => writeln!(f, "  {}.{} = {}", addr, ci + 1, sub.value())?,
                _ => writeln!(f, "  {}.{}.{} = {}", addr, ci + 1, si + 1, sub.value())?,
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_addressed_leaves() {
        let msg = Message::parse("MSH|^~\\&|LAB\rPID|1||123~456^^^EXT&X").expect("parse");
        let text = msg.tree().to_string();
        let expected = "-------- Message --------\n\
MSH\n  MSH.1 = |\n  MSH.2 = ^~\\&\n  MSH.3 = LAB\n\
PID\n  PID.1 = 1\n  PID.3 = 123\n  PID.3[2].1 = 456\n  PID.3[2].4.1 = EXT\n  PID.3[2].4.2 = X\n\
---------- End ----------\n";
        assert_eq!(text, expected);
    }
}
