//! Parsed HL7 message: ordered segments plus the authoritative message text.
//!
//! Reads resolve a [`Location`] against the first matching segment ([`Message::get`]) or
//! every matching segment and repetition ([`Message::get_all`]). Writes create whatever is
//! missing and rebuild the canonical text (segments joined by carriage return).

use crate::codec;
use crate::delimiters::{Delimiters, ParseOptions, HEADER_SEGMENT, MESSAGE_TRIM, SEGMENT_TERMINATOR};
use crate::error::{Hl7Error, Result};
use crate::location::Location;
use crate::segment::{self, Segment};
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    segments: Vec<Segment>,
    raw: String,
    delimiters: Delimiters,
}

impl Default for Message {
    fn default() -> Self {
        Message::new()
    }
}

impl Message {
    /// Empty message with the default delimiters, to be filled by writes or binding.
    pub fn new() -> Self {
        Message::with_delimiters(Delimiters::default())
    }

    pub fn with_delimiters(delimiters: Delimiters) -> Self {
        Message {
            segments: Vec::new(),
            raw: String::new(),
            delimiters,
        }
    }

    /// Parse one message with default options.
    pub fn parse(text: &str) -> Result<Self> {
        Message::parse_with(text, &ParseOptions::default())
    }

    /// Parse one message. Leading/trailing terminators and block characters are trimmed.
    pub fn parse_with(text: &str, options: &ParseOptions) -> Result<Self> {
        let trimmed = text.trim_matches(&MESSAGE_TRIM[..]);
        let delimiters = Delimiters::from_header(trimmed, options)?;
        let segments: Vec<Segment> = codec::split_segments(trimmed, &delimiters)?
            .into_iter()
            .map(|span| Segment::parse(span, delimiters))
            .collect();
        debug!(
            segments = segments.len(),
            field = %delimiters.field,
            encoding = %delimiters.encoding_characters(),
            "parsed message"
        );
        Ok(Message {
            segments,
            raw: trimmed.to_string(),
            delimiters,
        })
    }

    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Message text: the trimmed input, or the canonical encoding after any write.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.raw.as_bytes().to_vec()
    }

    /// Canonical wire text rebuilt from the hierarchy.
    pub fn encode(&self) -> String {
        let term = SEGMENT_TERMINATOR.to_string();
        self.segments
            .iter()
            .map(Segment::as_str)
            .collect::<Vec<_>>()
            .join(&term)
    }

    /// First segment named `name`.
    pub fn segment(&self, name: &str) -> Result<&Segment> {
        self.segments
            .iter()
            .find(|s| s.name() == name)
            .ok_or_else(|| Hl7Error::SegmentNotFound(name.to_string()))
    }

    /// Last segment named `name`.
    pub fn last_segment(&self, name: &str) -> Result<&Segment> {
        self.segments
            .iter()
            .rev()
            .find(|s| s.name() == name)
            .ok_or_else(|| Hl7Error::SegmentNotFound(name.to_string()))
    }

    /// Every segment named `name`, in wire order.
    pub fn all_segments(&self, name: &str) -> Result<Vec<&Segment>> {
        let segs: Vec<&Segment> = self.segments.iter().filter(|s| s.name() == name).collect();
        if segs.is_empty() {
            return Err(Hl7Error::SegmentNotFound(name.to_string()));
        }
        Ok(segs)
    }

    /// First value at `loc`: first matching segment, first repetition unless one is selected.
    pub fn get(&self, loc: &Location) -> Result<String> {
        if loc.targets_message() {
            return Ok(self.raw.clone());
        }
        self.segment(&loc.segment)?.get(loc)
    }

    /// Every value at `loc` across matching segments and repetitions, in document order.
    pub fn get_all(&self, loc: &Location) -> Result<Vec<String>> {
        if loc.targets_message() {
            return Ok(vec![self.raw.clone()]);
        }
        let mut vals = Vec::new();
        for seg in self.all_segments(&loc.segment)? {
            vals.extend(seg.get_all(loc)?);
        }
        if vals.is_empty() {
            return Err(Hl7Error::NotFound(loc.to_string()));
        }
        Ok(vals)
    }

    /// [`get`](Self::get) with address text, e.g. `"PID.5.1"`.
    pub fn find(&self, address: &str) -> Result<String> {
        self.get(&address.parse()?)
    }

    /// [`get_all`](Self::get_all) with address text.
    pub fn find_all(&self, address: &str) -> Result<Vec<String>> {
        self.get_all(&address.parse()?)
    }

    /// Write into the first matching segment, appending a new one if none exists.
    pub fn set(&mut self, loc: &Location, value: &str) -> Result<()> {
        let idx = self.write_target(loc, |segs, name| segs.iter().position(|s| s.name() == name))?;
        self.write_at(idx, loc, value)
    }

    /// Write into the last matching segment, appending a new one if none exists.
    pub fn set_last(&mut self, loc: &Location, value: &str) -> Result<()> {
        let idx = self.write_target(loc, |segs, name| segs.iter().rposition(|s| s.name() == name))?;
        self.write_at(idx, loc, value)
    }

    /// [`set`](Self::set) with address text.
    pub fn set_value(&mut self, address: &str, value: &str) -> Result<()> {
        self.set(&address.parse()?, value)
    }

    /// Append an empty segment holding only its name.
    pub fn push_segment(&mut self, name: &str) -> &mut Segment {
        self.segments.push(Segment::named(name, self.delimiters));
        self.rebuild();
        let last = self.segments.len() - 1;
        &mut self.segments[last]
    }

    fn write_target<F>(&mut self, loc: &Location, find: F) -> Result<usize>
    where
        F: Fn(&[Segment], &str) -> Option<usize>,
    {
        if loc.targets_message() {
            return Err(Hl7Error::SegmentRequired);
        }
        match loc.field_seq {
            None => return Err(Hl7Error::FieldRequired(loc.to_string())),
            Some(seq) if loc.segment == HEADER_SEGMENT && segment::is_delimiter_field(seq) => {
                return Err(Hl7Error::ReadOnlyHeader(loc.to_string()));
            }
            Some(_) => {}
        }
        match find(&self.segments, &loc.segment) {
            Some(idx) => Ok(idx),
            None => {
                self.segments.push(Segment::named(&loc.segment, self.delimiters));
                Ok(self.segments.len() - 1)
            }
        }
    }

    fn write_at(&mut self, idx: usize, loc: &Location, value: &str) -> Result<()> {
        self.segments[idx].set(loc, value)?;
        self.rebuild();
        Ok(())
    }

    /// Restore `MSH.1`/`MSH.2` from the delimiter set on every header segment.
    pub(crate) fn write_header_delimiters(&mut self) {
        for seg in self.segments.iter_mut().filter(|s| s.name() == HEADER_SEGMENT) {
            seg.write_header_delimiters();
        }
        self.rebuild();
    }

    fn rebuild(&mut self) {
        self.raw = self.encode();
    }
}

impl FromStr for Message {
    type Err = Hl7Error;

    fn from_str(s: &str) -> Result<Self> {
        Message::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADT: &str = "MSH|^~\\&|ADT1|MCM|LABADT|MCM|198808181126|SECURITY|ADT^A01|MSG00001|P|2.3.1\r\
EVN|A01|198808181123\r\
PID|||PATID1234^5^M11||JONES^WILLIAM^A^III||19610615|M\r\
NK1|1|JONES^BARBARA^K|WIFE\r\
PV1|1|I|2000^2012^01||||004777^LEBAUER^SIDNEY^J.\r";

    #[test]
    fn parses_segments_in_order() {
        let msg = Message::parse(ADT).expect("parse");
        let names: Vec<&str> = msg.segments().iter().map(Segment::name).collect();
        assert_eq!(names, vec!["MSH", "EVN", "PID", "NK1", "PV1"]);
        assert_eq!(msg.as_str(), ADT.trim_end_matches('\r'));
    }

    #[test]
    fn get_reads_header_and_body() {
        let msg = Message::parse(ADT).expect("parse");
        assert_eq!(msg.find("MSH.1").expect("sep"), "|");
        assert_eq!(msg.find("MSH.2").expect("enc"), "^~\\&");
        assert_eq!(msg.find("MSH.3").expect("app"), "ADT1");
        assert_eq!(msg.find("MSH.9.2").expect("trigger"), "A01");
        assert_eq!(msg.find("PID.5.1").expect("family"), "JONES");
        assert_eq!(msg.find("").expect("whole"), msg.as_str());
    }

    #[test]
    fn set_creates_segment_and_rebuilds() {
        let mut msg = Message::parse(ADT).expect("parse");
        msg.set_value("ZZZ.2.1", "x").expect("set");
        assert_eq!(msg.segments().len(), 6);
        assert!(msg.as_str().ends_with("\rZZZ||x"));
        assert_eq!(msg.find("ZZZ.2.1").expect("get"), "x");
    }

    #[test]
    fn set_requires_segment() {
        let mut msg = Message::new();
        assert!(matches!(
            msg.set(&Location::message(), "x"),
            Err(Hl7Error::SegmentRequired)
        ));
        assert!(msg.segments().is_empty());
    }

    #[test]
    fn set_refuses_header_delimiter_fields() {
        let mut msg = Message::parse("MSH|^~\\&|A\rPID|1").expect("parse");
        for address in ["MSH.1", "MSH.2", "MSH.2.1", "MSH.1[2]"] {
            assert!(matches!(
                msg.set_value(address, "#"),
                Err(Hl7Error::ReadOnlyHeader(_))
            ));
        }
        assert_eq!(msg.as_str(), "MSH|^~\\&|A\rPID|1");
        assert_eq!(msg.find("MSH.1").expect("sep"), "|");
        msg.set_value("MSH.3", "B").expect("set");
        assert_eq!(msg.as_str(), "MSH|^~\\&|B\rPID|1");
    }

    #[test]
    fn set_refuses_header_delimiters_without_header() {
        let mut msg = Message::new();
        assert!(matches!(
            msg.set_value("MSH.2", "x"),
            Err(Hl7Error::ReadOnlyHeader(_))
        ));
        assert!(msg.segments().is_empty());
    }

    #[test]
    fn set_last_targets_last_occurrence() {
        let mut msg = Message::parse(ADT).expect("parse");
        msg.push_segment("NK1");
        msg.set_last(&"NK1.1".parse().expect("loc"), "2").expect("set");
        assert_eq!(msg.find_all("NK1.1").expect("all"), vec!["1", "2"]);
    }
}
