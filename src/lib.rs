//! # hl7codec: HL7 v2.x pipe-delimited message codec
//!
//! Parses one HL7 v2 message into an addressable hierarchy, answers location queries,
//! writes values back, binds messages to typed schemas in both directions and checks
//! declarative validation rules.
//!
//! ## Hierarchy
//!
//! - **Message**: ordered segments, terminated by carriage return (optionally line feed)
//! - **Segment**: a name (`MSH`, `PID`, ...) plus fields separated by `|`
//! - **Field**: one or more repetitions separated by `~`
//! - **Component**: parts of a field occurrence separated by `^`
//! - **SubComponent**: parts of a component separated by `&`
//!
//! The delimiters are read from the `MSH` header of each message; the escape character
//! (`\` by default) makes the next character literal everywhere.
//!
//! ## Addresses
//!
//! ```text
//! PID.5.1        family name (field 5, component 1)
//! PID.3[2].1     component 1 of the second repetition of field 3
//! MSH.9          whole field
//! OBX            whole segment
//! OBX,repeating  binding tag: each schema instance opens a new OBX
//! ```
//!
//! ## Usage
//!
//! ```
//! use hl7codec::Message;
//!
//! let mut msg = Message::parse("MSH|^~\\&|LAB|HOSP\rPID|1||123^^^MR||DOE^JOHN").unwrap();
//! assert_eq!(msg.find("PID.5.2").unwrap(), "JOHN");
//! msg.set_value("PID.8", "M").unwrap();
//! assert_eq!(msg.segment("PID").unwrap().as_str(), "PID|1||123^^^MR||DOE^JOHN|||M");
//! ```
//!
//! Typed schemas are declared with [`hl7_schema!`]; see [`binding`] for the scope rules.

pub mod binding;
mod codec;
pub mod delimiters;
pub mod dump;
pub mod encode;
pub mod error;
pub mod info;
pub mod location;
pub mod message;
pub mod parser;
pub mod segment;
pub mod validation;

pub use binding::{Binding, BindingKind, Bound, Descriptor, LeafKind, Schema};
pub use delimiters::{Delimiters, ParseOptions};
pub use encode::{marshal, Encoder};
pub use error::{Hl7Error, Level, Result};
pub use info::MessageInfo;
pub use location::{Directive, Index, Location, Tag};
pub use message::Message;
pub use parser::parse_address;
pub use segment::{Component, Field, Segment, SubComponent};
pub use validation::{Check, Rule};
