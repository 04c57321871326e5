//! Construction direction: build wire bytes from a schema instance.

use crate::binding::{self, Bound, Cursor, Schema};
use crate::delimiters::Delimiters;
use crate::error::Result;
use crate::message::Message;
use std::io::Write;

/// Write `value` into `message` (fields in declaration order) and return the message bytes.
///
/// Header segments get their field separator and encoding characters written literally
/// once all fields are in place. Binding errors are collected; the bytes reflect every
/// field that could be written.
pub fn marshal<S: Schema>(message: &mut Message, value: &S) -> Bound<Vec<u8>> {
    let mut errors = Vec::new();
    binding::encode_into(value, message, Cursor::message(), &mut errors);
    message.write_header_delimiters();
    Bound {
        value: message.to_bytes(),
        errors,
    }
}

impl Message {
    /// New message built from `value` with the default delimiters.
    pub fn from_schema<S: Schema>(value: &S) -> Bound<Message> {
        let mut message = Message::new();
        let errors = marshal(&mut message, value).errors;
        Bound {
            value: message,
            errors,
        }
    }
}

/// Writes encoded messages to a stream.
pub struct Encoder<W: Write> {
    w: W,
    delimiters: Delimiters,
}

impl<W: Write> Encoder<W> {
    pub fn new(w: W) -> Self {
        Encoder::with_delimiters(w, Delimiters::default())
    }

    pub fn with_delimiters(w: W, delimiters: Delimiters) -> Self {
        Encoder { w, delimiters }
    }

    /// Encode `value` as one message and write it. The first binding error aborts the write.
    pub fn encode<S: Schema>(&mut self, value: &S) -> Result<()> {
        let mut message = Message::with_delimiters(self.delimiters);
        let bytes = marshal(&mut message, value).into_result()?;
        self.w.write_all(&bytes)?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.w
    }
}
