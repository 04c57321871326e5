//! Hierarchy nodes below the message: segment, field, component, subcomponent.
//!
//! A [`Segment`] owns its fields; repetitions of one field position are consecutive
//! [`Field`]s with the same sequence number. Node text is always derived by joining the
//! children with the level's delimiter, so the hierarchy is the source of truth and the
//! segment's raw text is rebuilt after every write.

use crate::codec;
use crate::delimiters::{Delimiters, HEADER_SEGMENT};
use crate::error::{Hl7Error, Level, Result};
use crate::location::{Index, Location};

/// Leaf text. Never subdivided.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubComponent {
    value: String,
}

impl SubComponent {
    pub fn new(value: impl Into<String>) -> Self {
        SubComponent { value: value.into() }
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    subcomponents: Vec<SubComponent>,
}

impl Default for Component {
    fn default() -> Self {
        Component::leaf("")
    }
}

impl Component {
    pub fn leaf(value: impl Into<String>) -> Self {
        Component {
            subcomponents: vec![SubComponent::new(value)],
        }
    }

    pub(crate) fn from_subcomponents(subcomponents: Vec<SubComponent>) -> Self {
        Component { subcomponents }
    }

    pub fn subcomponents(&self) -> &[SubComponent] {
        &self.subcomponents
    }

    /// Subcomponent by 0-based index.
    pub fn subcomponent(&self, index: usize) -> Result<&SubComponent> {
        self.subcomponents.get(index).ok_or(Hl7Error::IndexOutOfRange {
            level: Level::SubComponent,
            index: index + 1,
            len: self.subcomponents.len(),
        })
    }

    /// Subcomponents joined with the subcomponent delimiter.
    pub fn text(&self, d: &Delimiters) -> String {
        join(self.subcomponents.iter().map(|s| s.value.clone()), d.subcomponent)
    }

    pub fn get(&self, subcomponent: Index, d: &Delimiters) -> Result<String> {
        match subcomponent {
            Index::Unspecified => Ok(self.text(d)),
            Index::At(s) => Ok(self.subcomponent(s)?.value.clone()),
        }
    }

    fn set(&mut self, subcomponent: Index, value: &str) {
        match subcomponent {
            Index::Unspecified => self.subcomponents = vec![SubComponent::new(value)],
            Index::At(s) => {
                if self.subcomponents.len() <= s {
                    self.subcomponents.resize_with(s + 1, SubComponent::default);
                }
                self.subcomponents[s] = SubComponent::new(value);
            }
        }
    }
}

/// One occurrence of a field position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    seq: usize,
    components: Vec<Component>,
}

impl Field {
    pub(crate) fn leaf(seq: usize, value: impl Into<String>) -> Self {
        Field {
            seq,
            components: vec![Component::leaf(value)],
        }
    }

    pub(crate) fn from_components(seq: usize, components: Vec<Component>) -> Self {
        Field { seq, components }
    }

    /// Field position within the segment (0 = segment name).
    pub fn seq(&self) -> usize {
        self.seq
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Component by 0-based index.
    pub fn component(&self, index: usize) -> Result<&Component> {
        self.components.get(index).ok_or(Hl7Error::IndexOutOfRange {
            level: Level::Component,
            index: index + 1,
            len: self.components.len(),
        })
    }

    /// Components joined with the component delimiter.
    pub fn text(&self, d: &Delimiters) -> String {
        join(self.components.iter().map(|c| c.text(d)), d.component)
    }

    /// Read at component/subcomponent level. `subcomponent` is ignored when `component`
    /// is unspecified.
    pub fn get(&self, component: Index, subcomponent: Index, d: &Delimiters) -> Result<String> {
        match component {
            Index::Unspecified => Ok(self.text(d)),
            Index::At(c) => self.component(c)?.get(subcomponent, d),
        }
    }

    fn set(&mut self, component: Index, subcomponent: Index, value: &str) {
        match component {
            Index::Unspecified => self.components = vec![Component::leaf(value)],
            Index::At(c) => {
                if self.components.len() <= c {
                    self.components.resize_with(c + 1, Component::default);
                }
                self.components[c].set(subcomponent, value);
            }
        }
    }
}

fn join(parts: impl Iterator<Item = String>, delim: char) -> String {
    let mut out = String::new();
    for (i, p) in parts.enumerate() {
        if i > 0 {
            out.push(delim);
        }
        out.push_str(&p);
    }
    out
}

/// A named record. Field 0 is the segment name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    raw: String,
    fields: Vec<Field>,
    delimiters: Delimiters,
}

impl Segment {
    /// Tokenize one segment span (without its terminator).
    pub fn parse(raw: &str, delimiters: Delimiters) -> Self {
        Segment {
            raw: raw.to_string(),
            fields: codec::parse_fields(raw, &delimiters),
            delimiters,
        }
    }

    /// Empty segment holding only its name. A header segment also gets its field
    /// separator and encoding characters so the text stays parseable.
    pub fn named(name: &str, delimiters: Delimiters) -> Self {
        let mut seg = Segment {
            raw: String::new(),
            fields: vec![Field::leaf(0, name)],
            delimiters,
        };
        if name == HEADER_SEGMENT {
            seg.write_header_delimiters();
        } else {
            seg.rebuild();
        }
        seg
    }

    pub fn name(&self) -> &str {
        self.fields
            .first()
            .and_then(|f| f.components.first())
            .and_then(|c| c.subcomponents.first())
            .map(|s| s.value())
            .unwrap_or("")
    }

    /// Raw segment text, without terminator.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    fn max_seq(&self) -> usize {
        self.fields.last().map(|f| f.seq).unwrap_or(0)
    }

    /// Every occurrence at field position `seq`.
    pub fn all_fields(&self, seq: usize) -> Result<Vec<&Field>> {
        let found: Vec<&Field> = self.fields.iter().filter(|f| f.seq == seq).collect();
        if found.is_empty() {
            return Err(Hl7Error::IndexOutOfRange {
                level: Level::Field,
                index: seq,
                len: self.max_seq() + 1,
            });
        }
        Ok(found)
    }

    /// First occurrence at field position `seq`.
    pub fn field(&self, seq: usize) -> Result<&Field> {
        self.occurrence(seq, 0)
    }

    /// Occurrence `repetition` (0-based) at field position `seq`.
    pub fn occurrence(&self, seq: usize, repetition: usize) -> Result<&Field> {
        let all = self.all_fields(seq)?;
        let len = all.len();
        all.into_iter().nth(repetition).ok_or(Hl7Error::IndexOutOfRange {
            level: Level::Repetition,
            index: repetition + 1,
            len,
        })
    }

    /// Value at `loc`, ignoring its segment name. No field sequence reads the whole segment.
    pub fn get(&self, loc: &Location) -> Result<String> {
        let seq = match loc.field_seq {
            Some(seq) => seq,
            None => return Ok(self.raw.clone()),
        };
        let field = self.occurrence(seq, loc.repetition.unwrap_or(0))?;
        field.get(loc.component, loc.subcomponent, &self.delimiters)
    }

    /// Values at `loc` across every repetition of the field (or the one selected).
    pub fn get_all(&self, loc: &Location) -> Result<Vec<String>> {
        let seq = match loc.field_seq {
            Some(seq) => seq,
            None => return Ok(vec![self.raw.clone()]),
        };
        let fields = match loc.repetition {
            Some(r) => vec![self.occurrence(seq, r)?],
            None => self.all_fields(seq)?,
        };
        fields
            .into_iter()
            .map(|f| f.get(loc.component, loc.subcomponent, &self.delimiters))
            .collect()
    }

    /// Value at an address string, e.g. `"PID.5.1"`.
    pub fn find(&self, address: &str) -> Result<String> {
        self.get(&address.parse()?)
    }

    /// Write `value` at `loc`, creating missing fields, repetitions, components and
    /// subcomponents as empty placeholders. `MSH.1` and `MSH.2` cannot be written.
    pub fn set(&mut self, loc: &Location, value: &str) -> Result<()> {
        let seq = loc
            .field_seq
            .ok_or_else(|| Hl7Error::FieldRequired(loc.to_string()))?;
        if self.name() == HEADER_SEGMENT && is_delimiter_field(seq) {
            return Err(Hl7Error::ReadOnlyHeader(loc.to_string()));
        }
        let idx = self.ensure_occurrence(seq, loc.repetition.unwrap_or(0));
        self.fields[idx].set(loc.component, loc.subcomponent, value);
        self.rebuild();
        Ok(())
    }

    fn ensure_occurrence(&mut self, seq: usize, repetition: usize) -> usize {
        while self.max_seq() < seq {
            let next = if self.fields.is_empty() { 0 } else { self.max_seq() + 1 };
            self.fields.push(Field::leaf(next, ""));
        }
        let first = self.fields.iter().position(|f| f.seq == seq).unwrap_or(0);
        let count = self.fields[first..].iter().take_while(|f| f.seq == seq).count();
        for k in count..=repetition {
            self.fields.insert(first + k, Field::leaf(seq, ""));
        }
        first + repetition
    }

    /// Store the field separator as `MSH.1` and the encoding characters as `MSH.2`.
    pub(crate) fn write_header_delimiters(&mut self) {
        let d = self.delimiters;
        let i = self.ensure_occurrence(1, 0);
        self.fields[i] = Field::leaf(1, d.field.to_string());
        let i = self.ensure_occurrence(2, 0);
        self.fields[i] = Field::leaf(2, d.encoding_characters());
        self.rebuild();
    }

    fn rebuild(&mut self) {
        self.raw = codec::encode_fields(&self.fields, &self.delimiters);
    }
}

/// `MSH.1` and `MSH.2` are literal delimiter leaves.
pub(crate) fn is_delimiter_field(seq: usize) -> bool {
    seq == 1 || seq == 2
}
