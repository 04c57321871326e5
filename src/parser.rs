//! Parse address and binding-tag text using PEST.

use crate::error::{Hl7Error, Result};
use crate::location::{Directive, Index, Location, Tag};
use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "address.pest"]
struct AddressParser;

/// Parse address text (optionally carrying a directive) into a [`Tag`].
pub fn parse_address(source: &str) -> Result<Tag> {
    build_address(source).map_err(|reason| Hl7Error::InvalidAddress {
        address: source.to_string(),
        reason,
    })
}

fn build_address(source: &str) -> std::result::Result<Tag, String> {
    let pairs = AddressParser::parse(Rule::address, source)
        .map_err(|e| format!("Parse error: {}", e))?;
    let pair = pairs.into_iter().next().ok_or("Empty parse")?;

    let mut location = Location::default();
    let mut directive = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::segment_name => location.segment = inner.as_str().to_string(),
            Rule::field => build_field(inner, &mut location)?,
            Rule::directive => directive = Some(build_directive(inner)?),
            _ => {}
        }
    }
    if location.segment.is_empty() && location.field_seq.is_some() {
        return Err("field given without a segment name".to_string());
    }
    Ok(Tag { location, directive })
}

fn build_field(pair: pest::iterators::Pair<Rule>, location: &mut Location) -> std::result::Result<(), String> {
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::number => location.field_seq = Some(parse_number(inner.as_str())?),
            Rule::repetition => {
                let n = inner.into_inner().next().ok_or("repetition: missing number")?;
                let rep = parse_number(n.as_str())?;
                if rep == 0 {
                    return Err("repetition is 1-based".to_string());
                }
                location.repetition = Some(rep - 1);
            }
            Rule::component => build_component(inner, location)?,
            _ => {}
        }
    }
    Ok(())
}

fn build_component(pair: pest::iterators::Pair<Rule>, location: &mut Location) -> std::result::Result<(), String> {
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::number => location.component = Index::from_position(parse_number(inner.as_str())?),
            Rule::subcomponent => {
                let n = inner.into_inner().next().ok_or("subcomponent: missing number")?;
                location.subcomponent = Index::from_position(parse_number(n.as_str())?);
            }
            _ => {}
        }
    }
    Ok(())
}

fn build_directive(pair: pest::iterators::Pair<Rule>) -> std::result::Result<Directive, String> {
    let name = pair.into_inner().next().ok_or("directive: missing name")?;
    match name.as_str() {
        "repeating" => Ok(Directive::Repeating),
        other => Err(format!("Unknown directive: {}", other)),
    }
}

fn parse_number(s: &str) -> std::result::Result<usize, String> {
    s.parse().map_err(|_| format!("number out of range: {}", s))
}
