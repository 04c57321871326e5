//! Escape-aware tokenizer and segment serialisation.
//!
//! Tokenizing is the same delimiter-aware split applied at every level: segment
//! terminator, then field, repetition, component and subcomponent delimiters. The escape
//! character makes the character after it literal at every level (a two-character skip,
//! not escape-sequence decoding), so values keep their escape sequences verbatim and
//! re-encoding reproduces them.

use crate::delimiters::{Delimiters, HEADER_SEGMENT};
use crate::error::{Hl7Error, Result};
use crate::segment::{Component, Field, SubComponent};

/// Trailing spans at or below this many characters (segment name + separator) are dropped.
const MIN_TRAILING_SEGMENT: usize = 4;

/// Split `text` on `delim`, skipping the character that follows `escape`.
pub(crate) fn split_escaped(text: &str, delim: char, escape: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices();
    while let Some((i, ch)) = chars.next() {
        if ch == escape {
            chars.next();
            continue;
        }
        if ch == delim {
            parts.push(&text[start..i]);
            start = i + ch.len_utf8();
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Split trimmed message text into raw segment spans.
///
/// Blank lines between terminators are skipped. A final unterminated span is kept only
/// when it is longer than a bare segment name plus separator. An escape character pairs
/// with the character after it, so text ending in a sequence such as `\T\` is refused.
pub(crate) fn split_segments<'a>(text: &'a str, d: &Delimiters) -> Result<Vec<&'a str>> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices();
    while let Some((i, ch)) = chars.next() {
        if ch == d.escape {
            if chars.next().is_none() {
                return Err(Hl7Error::UnterminatedEscape);
            }
            continue;
        }
        if d.is_segment_terminator(ch) {
            let span = &text[start..i];
            if !span.is_empty() {
                spans.push(span);
            }
            start = i + ch.len_utf8();
        }
    }
    let tail = &text[start..];
    if tail.chars().count() > MIN_TRAILING_SEGMENT {
        spans.push(tail);
    }
    Ok(spans)
}

/// Byte offset just past the eighth character, when the span is a complete header.
fn header_split(raw: &str, d: &Delimiters) -> Option<usize> {
    if !raw.starts_with(HEADER_SEGMENT) {
        return None;
    }
    let mut it = raw.char_indices().skip(3);
    match it.next() {
        Some((_, ch)) if ch == d.field => {}
        _ => return None,
    }
    // four encoding characters follow the field separator
    let mut end = None;
    for (n, (i, ch)) in it.enumerate() {
        if n == 3 {
            end = Some(i + ch.len_utf8());
            break;
        }
    }
    end
}

/// Tokenize one segment span into its fields.
pub(crate) fn parse_fields(raw: &str, d: &Delimiters) -> Vec<Field> {
    let mut fields = Vec::new();
    match header_split(raw, d) {
        Some(end) => {
            // MSH.1 is the separator itself and MSH.2 the encoding characters; neither is split.
            let enc_start = HEADER_SEGMENT.len() + d.field.len_utf8();
            let tokens = split_escaped(&raw[end..], d.field, d.escape);
            fields.push(Field::leaf(0, HEADER_SEGMENT));
            fields.push(Field::leaf(1, d.field.to_string()));
            fields.push(Field::leaf(2, format!("{}{}", &raw[enc_start..end], tokens[0])));
            for (k, token) in tokens.iter().enumerate().skip(1) {
                push_occurrences(&mut fields, k + 2, token, d);
            }
        }
        None => {
            let tokens = split_escaped(raw, d.field, d.escape);
            fields.push(Field::leaf(0, tokens[0]));
            for (seq, token) in tokens.iter().enumerate().skip(1) {
                push_occurrences(&mut fields, seq, token, d);
            }
        }
    }
    fields
}

fn push_occurrences(fields: &mut Vec<Field>, seq: usize, token: &str, d: &Delimiters) {
    for occurrence in split_escaped(token, d.repetition, d.escape) {
        let components = split_escaped(occurrence, d.component, d.escape)
            .into_iter()
            .map(|c| {
                Component::from_subcomponents(
                    split_escaped(c, d.subcomponent, d.escape)
                        .into_iter()
                        .map(SubComponent::new)
                        .collect(),
                )
            })
            .collect();
        fields.push(Field::from_components(seq, components));
    }
}

/// Serialise fields (ordered by sequence, repetitions adjacent) back to segment text.
pub(crate) fn encode_fields(fields: &[Field], d: &Delimiters) -> String {
    let mut out = String::new();
    let max_seq = match fields.last() {
        Some(f) => f.seq(),
        None => return out,
    };
    let header = fields[0].seq() == 0 && fields[0].text(d) == HEADER_SEGMENT;
    let mut idx = 0;
    for seq in 0..=max_seq {
        let mut texts = Vec::new();
        while idx < fields.len() && fields[idx].seq() == seq {
            texts.push(fields[idx].text(d));
            idx += 1;
        }
        if header && seq == 1 {
            // the separator before MSH.2 is MSH.1
            continue;
        }
        if seq > 0 {
            out.push(d.field);
        }
        let rep = d.repetition.to_string();
        out.push_str(&texts.join(&rep));
    }
    out
}
