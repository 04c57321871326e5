//! Addresses into the message hierarchy.
//!
//! Address text is `SEGMENT[.field[[repetition]][.component[.subcomponent]]]`, 1-based,
//! trailing levels omissible; `PID.3[2].1` selects the first component of the second
//! repetition of `PID.3`. Component and subcomponent positions are converted to 0-based
//! [`Index`] values once, by the [parser](crate::parser); everything else works with
//! `Index` only.
//!
//! Binding tags use the same syntax plus an optional `,repeating` directive (see [`Tag`]).

use crate::error::{Hl7Error, Result};
use std::fmt;
use std::str::FromStr;

/// Component or subcomponent position: unspecified (whole parent) or a 0-based index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Index {
    #[default]
    Unspecified,
    At(usize),
}

impl Index {
    /// From a 1-based position; `0` means unspecified.
    pub fn from_position(position: usize) -> Self {
        match position {
            0 => Index::Unspecified,
            n => Index::At(n - 1),
        }
    }

    /// 1-based position, if specified.
    pub fn position(self) -> Option<usize> {
        match self {
            Index::Unspecified => None,
            Index::At(i) => Some(i + 1),
        }
    }

    pub fn is_specified(self) -> bool {
        matches!(self, Index::At(_))
    }
}

/// A read/write address. An empty `segment` addresses the whole message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Location {
    pub segment: String,
    /// Field position; 0 is the segment name, `None` the whole segment.
    pub field_seq: Option<usize>,
    /// 0-based repetition; `None` reads the first occurrence (or all, for `get_all`).
    pub repetition: Option<usize>,
    pub component: Index,
    pub subcomponent: Index,
}

impl Location {
    /// The whole message.
    pub fn message() -> Self {
        Location::default()
    }

    /// A whole segment.
    pub fn segment(name: impl Into<String>) -> Self {
        Location {
            segment: name.into(),
            ..Location::default()
        }
    }

    /// A whole field.
    pub fn field(name: impl Into<String>, seq: usize) -> Self {
        Location {
            segment: name.into(),
            field_seq: Some(seq),
            ..Location::default()
        }
    }

    pub fn with_repetition(mut self, repetition: usize) -> Self {
        self.repetition = Some(repetition);
        self
    }

    pub fn with_component(mut self, component: Index) -> Self {
        self.component = component;
        self
    }

    pub fn with_subcomponent(mut self, subcomponent: Index) -> Self {
        self.subcomponent = subcomponent;
        self
    }

    pub fn targets_message(&self) -> bool {
        self.segment.is_empty()
    }

    /// 1-based numeric levels present in the address: field, component, subcomponent.
    /// A subcomponent under an unspecified component is not counted.
    pub fn levels(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(3);
        if let Some(seq) = self.field_seq {
            out.push(seq);
            if let Some(c) = self.component.position() {
                out.push(c);
                if let Some(s) = self.subcomponent.position() {
                    out.push(s);
                }
            }
        }
        out
    }
}

impl FromStr for Location {
    type Err = Hl7Error;

    /// Parse a read/write address; binding directives are rejected.
    fn from_str(s: &str) -> Result<Self> {
        let tag = crate::parser::parse_address(s)?;
        if tag.directive.is_some() {
            return Err(Hl7Error::InvalidAddress {
                address: s.to_string(),
                reason: "directives are only valid in binding tags".to_string(),
            });
        }
        Ok(tag.location)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segment)?;
        if let Some(seq) = self.field_seq {
            write!(f, ".{}", seq)?;
            if let Some(r) = self.repetition {
                write!(f, "[{}]", r + 1)?;
            }
            if let Some(c) = self.component.position() {
                write!(f, ".{}", c)?;
                if let Some(s) = self.subcomponent.position() {
                    write!(f, ".{}", s)?;
                }
            }
        }
        Ok(())
    }
}

/// Directive suffix of a binding tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// The tagged element starts a new instance of a repeating segment.
    Repeating,
}

/// A binding tag: an address plus an optional directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub location: Location,
    pub directive: Option<Directive>,
}

impl Tag {
    pub fn parse(s: &str) -> Result<Self> {
        crate::parser::parse_address(s)
    }

    pub fn is_repeating(&self) -> bool {
        self.directive == Some(Directive::Repeating)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_positions() {
        assert_eq!(Index::from_position(0), Index::Unspecified);
        assert_eq!(Index::from_position(1), Index::At(0));
        assert_eq!(Index::At(4).position(), Some(5));
        assert_eq!(Index::Unspecified.position(), None);
    }

    #[test]
    fn levels_stop_at_first_unspecified() {
        let loc = Location::field("PID", 3).with_subcomponent(Index::At(1));
        assert_eq!(loc.levels(), vec![3]);
        let loc = Location::field("PID", 3)
            .with_component(Index::At(0))
            .with_subcomponent(Index::At(1));
        assert_eq!(loc.levels(), vec![3, 1, 2]);
    }

    #[test]
    fn display_round_trips() {
        for text in ["", "PID", "PID.3", "PID.3.1", "PID.3[2].1.4", "MSH.0"] {
            let loc: Location = text.parse().expect(text);
            assert_eq!(loc.to_string(), text);
        }
    }
}
