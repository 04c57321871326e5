//! Binding between typed schemas and the message hierarchy.
//!
//! Each schema type carries a static [`Descriptor`]: one [`Binding`] per Rust field with
//! its address tag and accessor kind. The descriptor is built once per type (by hand with
//! the builder methods, or with [`hl7_schema!`](crate::hl7_schema)) and drives both
//! directions with one recursive algorithm:
//!
//! - **decode** ([`Message::bind`]): message → schema. Leaves take the first value found
//!   and are left unset when nothing is there; nested schemas recurse into the first
//!   matching node; repeated schemas get one instance per matching node.
//! - **encode** ([`marshal`](crate::encode::marshal)): schema → message, in declaration
//!   order, through [`Message::set`] / [`Message::set_last`]. Every leaf is written,
//!   empty ones included, so a default-valued schema still lays out its segments.
//!
//! ## Scopes and relative tags
//!
//! A nested schema is resolved against the node its parent tag reached: a segment (tag
//! names only a segment), a field occurrence, a component or a subcomponent. Inside a
//! segment, tags are absolute (`PV1.3.1` is field 3, component 1). Inside a field or
//! component, tag levels already consumed by the parent are dropped; when the tag has no
//! more levels than the parent consumed, its last level alone is used. So both `PV1.3.1`
//! and `XCN.1` mean "component 1" inside a field.
//!
//! Binding errors are collected per field in [`Bound::errors`]; siblings keep binding.

use crate::error::{Hl7Error, Result};
use crate::location::{Index, Location, Tag};
use crate::message::Message;
use crate::segment::{Component, Field, Segment, SubComponent};
use crate::delimiters::Delimiters;
use tracing::{trace, warn};

/// Deepest hierarchy level below a segment (subcomponent).
const MAX_DEPTH: usize = 3;

/// A type that can be bound to a message through a static descriptor.
pub trait Schema: Default + 'static {
    fn descriptor() -> &'static Descriptor<Self>;
}

/// Kind of a leaf binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafKind {
    /// One `String`, the first value found.
    Text,
    /// `Vec<String>`, every value found.
    TextList,
}

/// Shape of one binding, as reported by [`Binding::kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// Value-less marker; with `,repeating` it opens a new segment when encoding.
    Marker,
    Leaf(LeafKind),
    /// One nested schema.
    Nested,
    /// A sequence of nested schemas.
    Repeated,
}

/// Result of a binding pass: the (possibly partial) value plus per-field errors.
#[derive(Debug)]
pub struct Bound<T> {
    pub value: T,
    pub errors: Vec<Hl7Error>,
}

impl<T> Bound<T> {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// The value, or the first recorded error.
    pub fn into_result(self) -> Result<T> {
        match self.errors.into_iter().next() {
            Some(e) => Err(e),
            None => Ok(self.value),
        }
    }
}

enum Access<S> {
    Marker,
    Text {
        get: fn(&S) -> &String,
        get_mut: fn(&mut S) -> &mut String,
    },
    TextList {
        get: fn(&S) -> &Vec<String>,
        get_mut: fn(&mut S) -> &mut Vec<String>,
    },
    Nested(Box<dyn NestedAccess<S>>),
}

/// One schema field: name, tag and accessor.
pub struct Binding<S> {
    field: &'static str,
    tag_text: &'static str,
    tag: std::result::Result<Tag, String>,
    access: Access<S>,
}

impl<S> Binding<S> {
    fn new(field: &'static str, tag_text: &'static str, access: Access<S>) -> Self {
        let tag = Tag::parse(tag_text).map_err(|e| match e {
            Hl7Error::InvalidAddress { reason, .. } => reason,
            other => other.to_string(),
        });
        Binding {
            field,
            tag_text,
            tag,
            access,
        }
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn tag_text(&self) -> &'static str {
        self.tag_text
    }

    /// The parsed tag, if it is well formed.
    pub fn tag(&self) -> Option<&Tag> {
        self.tag.as_ref().ok()
    }

    pub fn kind(&self) -> BindingKind {
        match &self.access {
            Access::Marker => BindingKind::Marker,
            Access::Text { .. } => BindingKind::Leaf(LeafKind::Text),
            Access::TextList { .. } => BindingKind::Leaf(LeafKind::TextList),
            Access::Nested(n) if n.repeated() => BindingKind::Repeated,
            Access::Nested(_) => BindingKind::Nested,
        }
    }
}

/// Static binding table of one schema type.
pub struct Descriptor<S> {
    name: &'static str,
    bindings: Vec<Binding<S>>,
}

impl<S: Schema> Descriptor<S> {
    pub fn new(name: &'static str) -> Self {
        Descriptor {
            name,
            bindings: Vec::new(),
        }
    }

    /// Value-less marker, e.g. `"OBX,repeating"`.
    pub fn marker(mut self, tag: &'static str) -> Self {
        self.bindings.push(Binding::new("marker", tag, Access::Marker));
        self
    }

    pub fn text(
        mut self,
        field: &'static str,
        tag: &'static str,
        get: fn(&S) -> &String,
        get_mut: fn(&mut S) -> &mut String,
    ) -> Self {
        self.bindings
            .push(Binding::new(field, tag, Access::Text { get, get_mut }));
        self
    }

    pub fn text_list(
        mut self,
        field: &'static str,
        tag: &'static str,
        get: fn(&S) -> &Vec<String>,
        get_mut: fn(&mut S) -> &mut Vec<String>,
    ) -> Self {
        self.bindings
            .push(Binding::new(field, tag, Access::TextList { get, get_mut }));
        self
    }

    pub fn nested<C: Schema>(
        mut self,
        field: &'static str,
        tag: &'static str,
        get: fn(&S) -> &C,
        get_mut: fn(&mut S) -> &mut C,
    ) -> Self {
        let access = Access::Nested(Box::new(One { get, get_mut }));
        self.bindings.push(Binding::new(field, tag, access));
        self
    }

    pub fn repeated<C: Schema>(
        mut self,
        field: &'static str,
        tag: &'static str,
        get: fn(&S) -> &Vec<C>,
        get_mut: fn(&mut S) -> &mut Vec<C>,
    ) -> Self {
        let access = Access::Nested(Box::new(Many { get, get_mut }));
        self.bindings.push(Binding::new(field, tag, access));
        self
    }
}

impl<S> Descriptor<S> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn bindings(&self) -> &[Binding<S>] {
        &self.bindings
    }

    /// Has a `,repeating` marker.
    pub fn has_marker(&self) -> bool {
        self.bindings.iter().any(|b| {
            matches!(b.access, Access::Marker) && b.tag().map_or(false, Tag::is_repeating)
        })
    }

    /// Has nested or repeated bindings (cannot sit at subcomponent depth).
    pub fn has_structure(&self) -> bool {
        self.bindings
            .iter()
            .any(|b| matches!(b.access, Access::Nested(_)))
    }

    fn path(&self, binding: &Binding<S>) -> String {
        format!("{}.{}", self.name, binding.field)
    }
}

// ==================== Hierarchy nodes ====================

/// A node reached while decoding; nested schemas resolve their tags against it.
#[derive(Clone, Copy)]
pub(crate) enum Node<'a> {
    Segment(&'a Segment),
    Field(&'a Field, &'a Delimiters),
    Component(&'a Component, &'a Delimiters),
    SubComponent(&'a SubComponent),
}

impl<'a> Node<'a> {
    fn depth(&self) -> usize {
        match self {
            Node::Segment(_) => 0,
            Node::Field(..) => 1,
            Node::Component(..) => 2,
            Node::SubComponent(_) => 3,
        }
    }

    fn text(&self) -> String {
        match self {
            Node::Segment(s) => s.as_str().to_string(),
            Node::Field(f, d) => f.text(d),
            Node::Component(c, d) => c.text(d),
            Node::SubComponent(s) => s.value().to_string(),
        }
    }

    /// Children at each of `levels` in turn (field seq, then 1-based positions).
    fn descend(self, levels: &[usize], repetition: Option<usize>) -> Vec<Node<'a>> {
        let (first, rest) = match levels.split_first() {
            Some((first, rest)) => (*first, rest),
            None => return vec![self],
        };
        let children: Vec<Node<'a>> = match self {
            Node::Segment(seg) => {
                let all = seg.all_fields(first).unwrap_or_default();
                let d = seg.delimiters();
                match repetition {
                    Some(r) => all.into_iter().nth(r).into_iter().map(|f| Node::Field(f, d)).collect(),
                    None => all.into_iter().map(|f| Node::Field(f, d)).collect(),
                }
            }
            Node::Field(f, d) => first
                .checked_sub(1)
                .and_then(|i| f.component(i).ok())
                .map(|c| Node::Component(c, d))
                .into_iter()
                .collect(),
            Node::Component(c, _) => first
                .checked_sub(1)
                .and_then(|i| c.subcomponent(i).ok())
                .map(Node::SubComponent)
                .into_iter()
                .collect(),
            Node::SubComponent(_) => Vec::new(),
        };
        children
            .into_iter()
            .flat_map(|c| c.descend(rest, None))
            .collect()
    }
}

#[derive(Clone, Copy)]
pub(crate) enum Scope<'a> {
    Message(&'a Message),
    Node(Node<'a>),
}

impl<'a> Scope<'a> {
    /// `None` at message scope.
    fn depth(&self) -> Option<usize> {
        match self {
            Scope::Message(_) => None,
            Scope::Node(n) => Some(n.depth()),
        }
    }

    fn resolve(&self, tag: &Tag) -> std::result::Result<Vec<Node<'a>>, String> {
        let loc = &tag.location;
        match *self {
            Scope::Message(m) => {
                if loc.targets_message() {
                    return Err("tag needs a segment name".to_string());
                }
                let levels = loc.levels();
                Ok(m.segments()
                    .iter()
                    .filter(|s| s.name() == loc.segment)
                    .flat_map(|s| Node::Segment(s).descend(&levels, loc.repetition))
                    .collect())
            }
            Scope::Node(node) => {
                let levels = relative(loc.levels(), node.depth());
                let repetition = if node.depth() == 0 { loc.repetition } else { None };
                Ok(node.descend(&levels, repetition))
            }
        }
    }
}

/// Tag levels that remain below a node at `depth` (see module docs). The address
/// grammar allows at most three levels, so the result never reaches past a subcomponent.
fn relative(levels: Vec<usize>, depth: usize) -> Vec<usize> {
    match depth {
        0 => levels,
        MAX_DEPTH => Vec::new(),
        _ if levels.len() > depth => levels[depth..].to_vec(),
        _ => levels.last().map(|l| vec![*l]).unwrap_or_default(),
    }
}

fn record(errors: &mut Vec<Hl7Error>, err: Hl7Error) {
    warn!(error = %err, "binding error");
    errors.push(err);
}

fn tag_error<S>(descriptor: &Descriptor<S>, binding: &Binding<S>, reason: String) -> Hl7Error {
    Hl7Error::BindingTag {
        field: descriptor.path(binding),
        tag: binding.tag_text.to_string(),
        reason,
    }
}

fn type_error(field: &str, reason: &str) -> Hl7Error {
    Hl7Error::BindingType {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

// ==================== Decode (message -> schema) ====================

pub(crate) fn decode_into<S: Schema>(target: &mut S, scope: Scope<'_>, errors: &mut Vec<Hl7Error>) {
    let descriptor = S::descriptor();
    for binding in &descriptor.bindings {
        let tag = match &binding.tag {
            Ok(tag) => tag,
            Err(reason) => {
                record(errors, tag_error(descriptor, binding, reason.clone()));
                continue;
            }
        };
        if let Access::Marker = binding.access {
            continue;
        }
        trace!(schema = descriptor.name, field = binding.field, tag = binding.tag_text, "decode");
        let nodes = match scope.resolve(tag) {
            Ok(nodes) => nodes,
            Err(reason) => {
                record(errors, tag_error(descriptor, binding, reason));
                continue;
            }
        };
        match &binding.access {
            Access::Marker => {}
            Access::Text { get_mut, .. } => {
                if let Some(node) = nodes.first() {
                    *get_mut(target) = node.text().trim().to_string();
                }
            }
            Access::TextList { get_mut, .. } => {
                if scope.depth().map_or(false, |d| d > 0) {
                    record(
                        errors,
                        type_error(&descriptor.path(binding), "text lists bind only at message or segment scope"),
                    );
                } else if !nodes.is_empty() {
                    *get_mut(target) = nodes.iter().map(|n| n.text().trim().to_string()).collect();
                }
            }
            Access::Nested(nested) => nested.decode(target, &nodes, &descriptor.path(binding), errors),
        }
    }
}

impl Message {
    /// Populate schema `S` from this message.
    pub fn bind<S: Schema>(&self) -> Bound<S> {
        let mut value = S::default();
        let mut errors = Vec::new();
        decode_into(&mut value, Scope::Message(self), &mut errors);
        Bound { value, errors }
    }
}

// ==================== Encode (schema -> message) ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pick {
    First,
    Last,
}

/// Where the schema being encoded writes.
#[derive(Debug, Clone)]
pub(crate) struct Cursor {
    /// `None` at message scope.
    segment: Option<String>,
    pick: Pick,
    /// Absolute levels reached by the parent tags: [field, component, subcomponent].
    base: Vec<usize>,
    repetition: Option<usize>,
}

impl Cursor {
    pub(crate) fn message() -> Self {
        Cursor {
            segment: None,
            pick: Pick::First,
            base: Vec::new(),
            repetition: None,
        }
    }

    fn depth(&self) -> Option<usize> {
        self.segment.as_ref().map(|_| self.base.len())
    }

    /// Segment name, absolute levels and repetition addressed by `tag` from here.
    fn target(&self, tag: &Tag) -> std::result::Result<(String, Vec<usize>, Option<usize>), String> {
        let loc = &tag.location;
        match (&self.segment, self.base.len()) {
            (None, _) => {
                if loc.targets_message() {
                    return Err("tag needs a segment name".to_string());
                }
                Ok((loc.segment.clone(), loc.levels(), loc.repetition))
            }
            (Some(seg), 0) => Ok((seg.clone(), loc.levels(), loc.repetition)),
            (Some(seg), depth) => {
                let mut levels = self.base.clone();
                levels.extend(relative(loc.levels(), depth));
                Ok((seg.clone(), levels, self.repetition))
            }
        }
    }

    fn location(&self, tag: &Tag) -> std::result::Result<Location, String> {
        let (segment, levels, repetition) = self.target(tag)?;
        Ok(location_of(segment, &levels, repetition))
    }

    fn write(&self, message: &mut Message, loc: &Location, value: &str) -> Result<()> {
        match self.pick {
            Pick::First => message.set(loc, value),
            Pick::Last => message.set_last(loc, value),
        }
    }

    /// Cursor for a nested schema; `element` is the index within a repeated binding.
    fn child(
        &self,
        tag: &Tag,
        element: Option<usize>,
        opens_segment: bool,
        message: &mut Message,
        field: &str,
    ) -> Result<Cursor> {
        let (segment, levels, repetition) = self.target(tag).map_err(|reason| Hl7Error::BindingTag {
            field: field.to_string(),
            tag: tag.location.to_string(),
            reason,
        })?;
        if levels.is_empty() {
            let mut pick = self.pick;
            if element.is_some() {
                if !opens_segment {
                    message.push_segment(&segment);
                }
                pick = Pick::Last;
            }
            return Ok(Cursor {
                segment: Some(segment),
                pick,
                base: Vec::new(),
                repetition: None,
            });
        }
        let repetition = match element {
            None => repetition,
            Some(i) if self.depth().map_or(true, |d| d == 0) => Some(i),
            Some(0) => repetition,
            Some(_) => {
                return Err(type_error(field, "only one element fits inside a single field occurrence"))
            }
        };
        Ok(Cursor {
            segment: Some(segment),
            pick: self.pick,
            base: levels,
            repetition,
        })
    }
}

fn location_of(segment: String, levels: &[usize], repetition: Option<usize>) -> Location {
    let position = |i: usize| levels.get(i).map_or(Index::Unspecified, |p| Index::from_position(*p));
    Location {
        segment,
        field_seq: levels.first().copied(),
        repetition,
        component: position(1),
        subcomponent: position(2),
    }
}

pub(crate) fn encode_into<S: Schema>(
    source: &S,
    message: &mut Message,
    mut cursor: Cursor,
    errors: &mut Vec<Hl7Error>,
) {
    let descriptor = S::descriptor();
    for binding in &descriptor.bindings {
        let tag = match &binding.tag {
            Ok(tag) => tag,
            Err(reason) => {
                record(errors, tag_error(descriptor, binding, reason.clone()));
                continue;
            }
        };
        trace!(schema = descriptor.name, field = binding.field, tag = binding.tag_text, "encode");
        match &binding.access {
            Access::Marker => {
                if !tag.is_repeating() || cursor.depth().map_or(false, |d| d > 0) {
                    continue;
                }
                if tag.location.targets_message() {
                    record(errors, tag_error(descriptor, binding, "marker needs a segment name".to_string()));
                    continue;
                }
                message.push_segment(&tag.location.segment);
                cursor.pick = Pick::Last;
                if cursor.segment.is_some() {
                    cursor.segment = Some(tag.location.segment.clone());
                }
            }
            Access::Text { get, .. } => {
                let value = get(source);
                let written = cursor
                    .location(tag)
                    .and_then(|loc| cursor.write(message, &loc, value).map_err(|e| e.to_string()));
                if let Err(reason) = written {
                    record(errors, tag_error(descriptor, binding, reason));
                }
            }
            Access::TextList { get, .. } => {
                if cursor.depth().map_or(false, |d| d > 0) {
                    record(
                        errors,
                        type_error(&descriptor.path(binding), "text lists bind only at message or segment scope"),
                    );
                    continue;
                }
                let loc = match cursor.location(tag) {
                    Ok(loc) => loc,
                    Err(reason) => {
                        record(errors, tag_error(descriptor, binding, reason));
                        continue;
                    }
                };
                for (i, value) in get(source).iter().enumerate() {
                    let rep = loc.clone().with_repetition(i);
                    if let Err(e) = cursor.write(message, &rep, value) {
                        record(errors, tag_error(descriptor, binding, e.to_string()));
                        break;
                    }
                }
            }
            Access::Nested(nested) => {
                nested.encode(source, message, &cursor, tag, &descriptor.path(binding), errors)
            }
        }
    }
}

// ==================== Nested accessors ====================

/// Type-erased access to a nested schema field of `S`.
trait NestedAccess<S>: Send + Sync {
    fn repeated(&self) -> bool;

    fn decode(&self, target: &mut S, nodes: &[Node<'_>], field: &str, errors: &mut Vec<Hl7Error>);

    fn encode(
        &self,
        source: &S,
        message: &mut Message,
        cursor: &Cursor,
        tag: &Tag,
        field: &str,
        errors: &mut Vec<Hl7Error>,
    );
}

/// A child schema bound at subcomponent depth cannot hold further structure.
fn check_depth<C: Schema>(depth: Option<usize>, field: &str) -> Result<()> {
    if depth == Some(MAX_DEPTH) && C::descriptor().has_structure() {
        return Err(type_error(field, "nested schema cannot bind below subcomponent level"));
    }
    Ok(())
}

struct One<S, C> {
    get: fn(&S) -> &C,
    get_mut: fn(&mut S) -> &mut C,
}

impl<S: 'static, C: Schema> NestedAccess<S> for One<S, C> {
    fn repeated(&self) -> bool {
        false
    }

    fn decode(&self, target: &mut S, nodes: &[Node<'_>], field: &str, errors: &mut Vec<Hl7Error>) {
        let node = match nodes.first() {
            Some(node) => *node,
            None => return,
        };
        if let Err(e) = check_depth::<C>(Some(node.depth()), field) {
            record(errors, e);
            return;
        }
        decode_into((self.get_mut)(target), Scope::Node(node), errors);
    }

    fn encode(
        &self,
        source: &S,
        message: &mut Message,
        cursor: &Cursor,
        tag: &Tag,
        field: &str,
        errors: &mut Vec<Hl7Error>,
    ) {
        let child = cursor
            .child(tag, None, false, message, field)
            .and_then(|c| check_depth::<C>(c.depth(), field).map(|_| c));
        match child {
            Ok(child) => encode_into((self.get)(source), message, child, errors),
            Err(e) => record(errors, e),
        }
    }
}

struct Many<S, C> {
    get: fn(&S) -> &Vec<C>,
    get_mut: fn(&mut S) -> &mut Vec<C>,
}

impl<S: 'static, C: Schema> NestedAccess<S> for Many<S, C> {
    fn repeated(&self) -> bool {
        true
    }

    fn decode(&self, target: &mut S, nodes: &[Node<'_>], field: &str, errors: &mut Vec<Hl7Error>) {
        let mut items = Vec::with_capacity(nodes.len());
        for node in nodes {
            if let Err(e) = check_depth::<C>(Some(node.depth()), field) {
                record(errors, e);
                return;
            }
            let mut item = C::default();
            decode_into(&mut item, Scope::Node(*node), errors);
            items.push(item);
        }
        if !items.is_empty() {
            *(self.get_mut)(target) = items;
        }
    }

    fn encode(
        &self,
        source: &S,
        message: &mut Message,
        cursor: &Cursor,
        tag: &Tag,
        field: &str,
        errors: &mut Vec<Hl7Error>,
    ) {
        let opens_segment = C::descriptor().has_marker();
        for (i, item) in (self.get)(source).iter().enumerate() {
            let child = cursor
                .child(tag, Some(i), opens_segment, message, field)
                .and_then(|c| check_depth::<C>(c.depth(), field).map(|_| c));
            match child {
                Ok(child) => encode_into(item, message, child, errors),
                Err(e) => {
                    record(errors, e);
                    return;
                }
            }
        }
    }
}

/// Implement [`Schema`] for a struct from a list of field bindings.
///
/// ```ignore
/// hl7_schema! {
///     Observation {
///         marker "OBX,repeating",
///         set_id: text "OBX.1",
///         value: text "OBX.5",
///     }
/// }
/// hl7_schema! {
///     Report {
///         patient_ids: text_list "PID.3.1",
///         visit: nested(PatientVisit) "PV1",
///         observations: repeated(Observation) "OBX",
///     }
/// }
/// ```
#[macro_export]
macro_rules! hl7_schema {
    ($ty:ident { $($body:tt)* }) => {
        impl $crate::binding::Schema for $ty {
            fn descriptor() -> &'static $crate::binding::Descriptor<Self> {
                static DESCRIPTOR: ::std::sync::OnceLock<$crate::binding::Descriptor<$ty>> =
                    ::std::sync::OnceLock::new();
                DESCRIPTOR.get_or_init(|| {
                    $crate::hl7_schema!(@bind $crate::binding::Descriptor::<$ty>::new(stringify!($ty)); $($body)*)
                })
            }
        }
    };
    (@bind $d:expr; ) => { $d };
    (@bind $d:expr; marker $tag:literal $(, $($rest:tt)*)?) => {
        $crate::hl7_schema!(@bind $d.marker($tag); $($($rest)*)?)
    };
    (@bind $d:expr; $field:ident : text $tag:literal $(, $($rest:tt)*)?) => {
        $crate::hl7_schema!(@bind $d.text(stringify!($field), $tag, |s| &s.$field, |s| &mut s.$field); $($($rest)*)?)
    };
    (@bind $d:expr; $field:ident : text_list $tag:literal $(, $($rest:tt)*)?) => {
        $crate::hl7_schema!(@bind $d.text_list(stringify!($field), $tag, |s| &s.$field, |s| &mut s.$field); $($($rest)*)?)
    };
    (@bind $d:expr; $field:ident : nested($child:ty) $tag:literal $(, $($rest:tt)*)?) => {
        $crate::hl7_schema!(@bind $d.nested::<$child>(stringify!($field), $tag, |s| &s.$field, |s| &mut s.$field); $($($rest)*)?)
    };
    (@bind $d:expr; $field:ident : repeated($child:ty) $tag:literal $(, $($rest:tt)*)?) => {
        $crate::hl7_schema!(@bind $d.repeated::<$child>(stringify!($field), $tag, |s| &s.$field, |s| &mut s.$field); $($($rest)*)?)
    };
}
