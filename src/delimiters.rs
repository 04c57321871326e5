//! Delimiter set declared by the message header, and parse configuration.
//!
//! The header segment fixes every special character of a message in its first eight
//! characters: `MSH` + field separator + component, repetition, escape and subcomponent
//! characters. Everything downstream (tokenizer, traversal, encoder) reads them from here.

use crate::error::{Hl7Error, Result};

/// Name of the header segment that declares the delimiters.
pub const HEADER_SEGMENT: &str = "MSH";

/// Segment terminator on the wire.
pub const SEGMENT_TERMINATOR: char = '\r';

/// Characters trimmed from both ends of a message before tokenizing
/// (segment terminators plus MLLP-style block characters).
pub const MESSAGE_TRIM: [char; 4] = ['\r', '\n', '\x1c', '\x0b'];

/// Header characters needed to resolve the delimiters.
const HEADER_LEN: usize = 8;

/// Options controlling how raw text is tokenized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParseOptions {
    /// Treat a line feed as a segment terminator in addition to carriage return.
    pub lf_terminates_segments: bool,
}

impl ParseOptions {
    pub fn with_lf_terminator(mut self, on: bool) -> Self {
        self.lf_terminates_segments = on;
        self
    }
}

/// Special characters of one message. Immutable once resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiters {
    pub field: char,
    pub component: char,
    pub repetition: char,
    pub escape: char,
    pub subcomponent: char,
    /// Line feed also terminates a segment.
    pub lf_terminates: bool,
}

impl Default for Delimiters {
    /// HL7 defaults: `| ^ ~ \ &`, carriage-return termination only.
    fn default() -> Self {
        Delimiters {
            field: '|',
            component: '^',
            repetition: '~',
            escape: '\\',
            subcomponent: '&',
            lf_terminates: false,
        }
    }
}

impl Delimiters {
    /// Resolve the delimiter set from the (already trimmed) message text.
    pub fn from_header(text: &str, options: &ParseOptions) -> Result<Self> {
        let head: Vec<char> = text.chars().take(HEADER_LEN).collect();
        if head.len() < HEADER_LEN {
            return Err(Hl7Error::TooShort { len: head.len() });
        }
        let name: String = head[..3].iter().collect();
        if name != HEADER_SEGMENT {
            return Err(Hl7Error::MissingHeader { found: name });
        }
        Ok(Delimiters {
            field: head[3],
            component: head[4],
            repetition: head[5],
            escape: head[6],
            subcomponent: head[7],
            lf_terminates: options.lf_terminates_segments,
        })
    }

    /// The four encoding characters in header order: component, repetition, escape,
    /// subcomponent (the literal value of `MSH.2`).
    pub fn encoding_characters(&self) -> String {
        [self.component, self.repetition, self.escape, self.subcomponent]
            .iter()
            .collect()
    }

    pub(crate) fn is_segment_terminator(&self, ch: char) -> bool {
        ch == SEGMENT_TERMINATOR || (self.lf_terminates && ch == '\n')
    }
}
