//! Error type shared by parsing, traversal, binding and encoding.
//!
//! Parse errors are fatal for one message. Lookup errors are per call. Binding errors are
//! per schema field and are collected rather than aborting sibling fields. Validation
//! failures are not errors at all (see [`validation`](crate::validation)).

use std::fmt;

/// Alias for a `Result` with the error type [`Hl7Error`].
pub type Result<T> = std::result::Result<T, Hl7Error>;

/// Hierarchy level named in [`Hl7Error::IndexOutOfRange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Field,
    Repetition,
    Component,
    SubComponent,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Level::Field => "field",
            Level::Repetition => "repetition",
            Level::Component => "component",
            Level::SubComponent => "subcomponent",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Hl7Error {
    #[error("Parse: message too short ({len} characters, header needs at least 8)")]
    TooShort { len: usize },
    #[error("Parse: missing header segment (message starts with {found:?})")]
    MissingHeader { found: String },
    #[error("Parse: unterminated escape at end of message")]
    UnterminatedEscape,
    #[error("Segment not found: {0}")]
    SegmentNotFound(String),
    #[error("{level} index {index} out of range ({len} present)")]
    IndexOutOfRange { level: Level, index: usize, len: usize },
    #[error("No values found at {0}")]
    NotFound(String),
    #[error("Segment is required")]
    SegmentRequired,
    #[error("Field sequence is required to write {0}")]
    FieldRequired(String),
    #[error("{0} holds the message delimiters and is read-only")]
    ReadOnlyHeader(String),
    #[error("Invalid address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("Binding {field}: {reason}")]
    BindingType { field: String, reason: String },
    #[error("Binding {field}: bad tag {tag:?}: {reason}")]
    BindingTag {
        field: String,
        tag: String,
        reason: String,
    },
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
}

impl Hl7Error {
    /// Structurally unparseable input.
    pub fn is_parse(&self) -> bool {
        matches!(
            self,
            Hl7Error::TooShort { .. } | Hl7Error::MissingHeader { .. } | Hl7Error::UnterminatedEscape
        )
    }

    /// Recoverable read failure for one address.
    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            Hl7Error::SegmentNotFound(_) | Hl7Error::IndexOutOfRange { .. } | Hl7Error::NotFound(_)
        )
    }

    /// Failure confined to one schema field.
    pub fn is_binding(&self) -> bool {
        matches!(self, Hl7Error::BindingType { .. } | Hl7Error::BindingTag { .. })
    }
}
