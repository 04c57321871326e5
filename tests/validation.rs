//! Validation rules: presence and specific-value checks, failure multiplicity.

use hl7codec::{Check, Message, Rule};

const ORU_R01: &str = "MSH|^~\\&|LAB|HOSP|EHR|CLINIC|20240105083000||ORU^R01|CTRL42|P|2.5.1\r\
PID|1||123^^^HOSP^MR||DOE^JANE||19700101|F\r\
OBX|1|NM|WBC||7.2||||||F\r\
OBX|2|NM|HGB||||||||P\r\
OBX|3|ST|NOTE||text||||||F\r";

fn message() -> Message {
    Message::parse(ORU_R01).expect("parse")
}

#[test]
fn test_all_rules_pass() {
    let rules = vec![
        Rule::presence("MSH.10"),
        Rule::specific_value("MSH.9.1", "ORU"),
        Rule::specific_value("MSH.12", "2.5.1"),
        Rule::presence("PID.5.2"),
    ];
    let (valid, failures) = message().is_valid(&rules);
    assert!(valid);
    assert!(failures.is_empty());
}

#[test]
fn test_empty_rule_set_is_valid() {
    let (valid, failures) = message().is_valid(&[]);
    assert!(valid);
    assert!(failures.is_empty());
}

#[test]
fn test_unresolved_rule_recorded_once() {
    let rules = vec![Rule::presence("ZZZ.1"), Rule::presence("PID.40"), Rule::presence("PID.x")];
    let (valid, failures) = message().is_valid(&rules);
    assert!(!valid);
    assert_eq!(failures, rules);
}

#[test]
fn test_specific_value_mismatch_recorded_per_occurrence() {
    let rule = Rule::specific_value("OBX.11", "F");
    let (valid, failures) = message().is_valid(std::slice::from_ref(&rule));
    assert!(!valid);
    assert_eq!(failures, vec![rule]);
}

#[test]
fn test_every_failing_occurrence_is_recorded() {
    let rule = Rule::specific_value("OBX.2", "ST");
    let (valid, failures) = message().is_valid(std::slice::from_ref(&rule));
    assert!(!valid);
    assert_eq!(failures.len(), 2);
    assert!(failures.iter().all(|r| *r == rule));
}

#[test]
fn test_short_segment_does_not_hide_other_values() {
    let msg = Message::parse("MSH|^~\\&|A\rOBX|1|NM|X||7\rOBX|2").expect("parse");
    let rule = Rule::specific_value("OBX.5", "9");
    let (valid, failures) = msg.is_valid(std::slice::from_ref(&rule));
    assert!(!valid);
    // one for the short OBX, one for the "7" that does resolve
    assert_eq!(failures, vec![rule.clone(), rule]);

    let matching = Rule::specific_value("OBX.5", "7");
    let (valid, failures) = msg.is_valid(std::slice::from_ref(&matching));
    assert!(!valid);
    assert_eq!(failures, vec![matching]);
}

#[test]
fn test_presence_fails_on_empty_value() {
    let rule = Rule::presence("OBX.5");
    let (valid, failures) = message().is_valid(std::slice::from_ref(&rule));
    assert!(!valid);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].check, Check::Presence);
}

#[test]
fn test_failures_keep_rule_order() {
    let rules = vec![
        Rule::specific_value("MSH.9.2", "A01"),
        Rule::presence("MSH.3"),
        Rule::specific_value("OBX.11", "F"),
        Rule::presence("EVN.1"),
    ];
    let (valid, failures) = message().is_valid(&rules);
    assert!(!valid);
    assert_eq!(
        failures,
        vec![rules[0].clone(), rules[2].clone(), rules[3].clone()]
    );
}

#[test]
fn test_rules_are_plain_data() {
    let rule = Rule::specific_value("PID.8", "F");
    assert_eq!(rule.location, "PID.8");
    assert_eq!(rule.check, Check::SpecificValue);
    assert_eq!(rule.value, "F");
    let presence = Rule::presence("PID.8");
    assert_eq!(presence.value, "");
}
