//! Integration tests: parsing, delimiter handling, lookups and writes on whole messages,
//! canonical re-encoding and the stream encoder.

use hl7codec::{Encoder, Hl7Error, Location, Message, MessageInfo, ParseOptions};
use proptest::prelude::*;
use std::io::Read;

const ADT_A01: &str = "MSH|^~\\&|ADT1|MCM|LABADT|MCM|198808181126|SECURITY|ADT^A01|MSG00001|P|2.3.1\r\
EVN|A01|198808181123\r\
PID|||PATID1234^5^M11^^MR~PATID5678^^^^SS||JONES^WILLIAM^A^III||19610615|M\r\
NK1|1|JONES^BARBARA^K|WIFE\r\
PV1|1|I|2000^2012^01||||004777^LEBAUER^SIDNEY^J.\r";

#[test]
fn test_parse_counts_segments() {
    let msg = Message::parse(ADT_A01).expect("parse");
    assert_eq!(msg.segments().len(), 5);
    assert_eq!(msg.find("EVN.2").expect("evn"), "198808181123");
    assert_eq!(msg.find("PV1.7.2").expect("doctor"), "LEBAUER");
}

#[test]
fn test_set_new_segment_appends() {
    let mut msg = Message::parse(ADT_A01).expect("parse");
    msg.set_value("ZZZ.1", "custom").expect("set");
    assert_eq!(msg.segments().len(), 6);
    assert_eq!(msg.segments()[5].name(), "ZZZ");
    let reparsed = Message::parse(msg.as_str()).expect("reparse");
    assert_eq!(reparsed.segments().len(), 6);
    assert_eq!(reparsed.find("ZZZ.1").expect("get"), "custom");
}

#[test]
fn test_missing_segment_is_reported() {
    let msg = Message::parse(ADT_A01).expect("parse");
    assert!(matches!(msg.find("OBX.5"), Err(Hl7Error::SegmentNotFound(ref s)) if s == "OBX"));
    assert!(msg.find("OBX.5").unwrap_err().is_lookup());
}

#[test]
fn test_header_fields_are_literal() {
    let msg = Message::parse(ADT_A01).expect("parse");
    assert_eq!(msg.find("MSH.0").expect("name"), "MSH");
    assert_eq!(msg.find("MSH.1").expect("sep"), "|");
    assert_eq!(msg.find("MSH.2").expect("enc"), "^~\\&");
    assert_eq!(msg.find("MSH.9").expect("type"), "ADT^A01");
    assert_eq!(msg.find("MSH.12").expect("version"), "2.3.1");
}

#[test]
fn test_custom_delimiters() {
    let msg = Message::parse("MSH#:*!@#APP:SUB#A*B#x@y\rPID#1#N:M").expect("parse");
    assert_eq!(msg.find("MSH.1").expect("sep"), "#");
    assert_eq!(msg.find("MSH.2").expect("enc"), ":*!@");
    assert_eq!(msg.find("MSH.3.2").expect("component"), "SUB");
    assert_eq!(msg.find_all("MSH.4").expect("reps"), vec!["A", "B"]);
    assert_eq!(msg.find("MSH.5.1.2").expect("sub"), "y");
    assert_eq!(msg.find("PID.2.2").expect("pid"), "M");
    assert_eq!(msg.encode(), "MSH#:*!@#APP:SUB#A*B#x@y\rPID#1#N:M");
}

#[test]
fn test_escaped_delimiters_are_literal() {
    let text = "MSH|^~\\&|APP\rOBX|1|TX|NOTE||a\\|b^c\\^d~e\\F\\f";
    let msg = Message::parse(text).expect("parse");
    assert_eq!(msg.find("OBX.5.1").expect("first"), "a\\|b");
    assert_eq!(msg.find("OBX.5.2").expect("second"), "c\\^d");
    assert_eq!(msg.find("OBX.5[2]").expect("repetition"), "e\\F\\f");
    assert_eq!(msg.encode(), text);
}

#[test]
fn test_escape_before_segment_terminator() {
    let msg = Message::parse("MSH|^~\\&|APP\rNTE|1|a\\\rb\rPID|1").expect("parse");
    assert_eq!(msg.segments().len(), 3);
    assert_eq!(msg.find("NTE.2").expect("note"), "a\\\rb");
}

#[test]
fn test_parse_errors() {
    assert!(matches!(Message::parse("MSH|^~"), Err(Hl7Error::TooShort { len: 6 })));
    assert!(matches!(Message::parse(""), Err(Hl7Error::TooShort { len: 0 })));
    assert!(matches!(
        Message::parse("PID|1||123^^^MR"),
        Err(Hl7Error::MissingHeader { .. })
    ));
    let err = Message::parse("MSH|^~\\&|APP\rPID|1|x\\").unwrap_err();
    assert!(matches!(err, Hl7Error::UnterminatedEscape));
    assert!(err.is_parse());

    // an escape sequence closing the message leaves its last escape character unpaired
    assert!(matches!(
        Message::parse("MSH|^~\\&|A\rOBX|1|TX|||a\\T\\"),
        Err(Hl7Error::UnterminatedEscape)
    ));
    let msg = Message::parse("MSH|^~\\&|A\rOBX|1|TX|||a\\T\\b").expect("parse");
    assert_eq!(msg.find("OBX.5").expect("text"), "a\\T\\b");
}

#[test]
fn test_framing_characters_are_trimmed() {
    let framed = format!("\x0b{}\x1c\r", ADT_A01);
    let msg = Message::parse(&framed).expect("parse");
    assert_eq!(msg.segments().len(), 5);
    assert!(msg.as_str().starts_with("MSH|"));
    assert!(msg.as_str().ends_with("J."));
}

#[test]
fn test_line_feed_option() {
    let text = "MSH|^~\\&|APP\nPID|1||123\n";
    let plain = Message::parse(text).expect("parse");
    assert_eq!(plain.segments().len(), 1);
    assert_eq!(plain.find("MSH.3").expect("app"), "APP\nPID");

    let opts = ParseOptions::default().with_lf_terminator(true);
    let lf = Message::parse_with(text, &opts).expect("parse lf");
    assert_eq!(lf.segments().len(), 2);
    assert_eq!(lf.find("PID.3").expect("id"), "123");
    assert_eq!(lf.encode(), "MSH|^~\\&|APP\rPID|1||123");
}

#[test]
fn test_blank_lines_and_short_tail_are_skipped() {
    let msg = Message::parse("MSH|^~\\&|APP\r\r\rPID|1\rZZ|").expect("parse");
    let names: Vec<&str> = msg.segments().iter().map(|s| s.name()).collect();
    assert_eq!(names, vec!["MSH", "PID"]);
}

#[test]
fn test_set_rebuilds_text() {
    let mut msg = Message::parse(ADT_A01).expect("parse");
    msg.set_value("PID.5.1", "SMITH").expect("set family");
    msg.set_value("PID.3[2].5", "DL").expect("set second id type");
    let pid = msg.segment("PID").expect("pid");
    assert_eq!(
        pid.as_str(),
        "PID|||PATID1234^5^M11^^MR~PATID5678^^^^DL||SMITH^WILLIAM^A^III||19610615|M"
    );
    assert!(msg.as_str().contains(pid.as_str()));
    assert_eq!(msg.to_bytes(), msg.as_str().as_bytes());
}

#[test]
fn test_message_info() {
    let info = Message::parse(ADT_A01).expect("parse").info().expect("info");
    assert_eq!(info.sending_app, "ADT1");
    assert_eq!(info.receiving_app, "LABADT");
    assert_eq!(info.message_type, "ADT");
    assert_eq!(info.trigger_event, "A01");
    assert_eq!(info.structure, "");
    assert_eq!(info.control_id, "MSG00001");
    assert_eq!(info.version, "2.3.1");
}

#[test]
fn test_tree_dump_lists_values() {
    let msg = Message::parse(ADT_A01).expect("parse");
    let tree = msg.tree().to_string();
    assert!(tree.starts_with("-------- Message --------\n"));
    assert!(tree.ends_with("---------- End ----------\n"));
    assert!(tree.contains("  PID.3[2].1 = PATID5678\n"));
    assert!(tree.contains("  NK1.2.3 = K\n"));
}

#[test]
fn test_encoder_writes_to_file() {
    let info = MessageInfo {
        sending_app: "LAB".into(),
        receiving_app: "EHR".into(),
        message_type: "ORU".into(),
        trigger_event: "R01".into(),
        control_id: "42".into(),
        version: "2.5".into(),
        ..MessageInfo::default()
    };
    let mut file = tempfile::tempfile().expect("tempfile");
    {
        let mut encoder = Encoder::new(&mut file);
        encoder.encode(&info).expect("encode");
    }
    use std::io::{Seek, SeekFrom};
    file.seek(SeekFrom::Start(0)).expect("seek");
    let mut text = String::new();
    file.read_to_string(&mut text).expect("read");
    assert_eq!(text, "MSH|^~\\&|LAB||EHR||||ORU^R01^|42||2.5");
    let decoded = Message::parse(&text).expect("parse").info().expect("info");
    assert_eq!(decoded, info);
}

#[test]
fn test_encoder_into_inner() {
    let info = MessageInfo {
        sending_app: "A".into(),
        ..MessageInfo::default()
    };
    let mut encoder = Encoder::new(Vec::new());
    encoder.encode(&info).expect("encode");
    assert_eq!(encoder.into_inner(), b"MSH|^~\\&|A||||||^^|||".to_vec());
}

fn segment_strategy() -> impl Strategy<Value = String> {
    (
        "[A-LN-Z][A-Z0-9]{2}",
        prop::collection::vec(
            "[A-Za-z0-9]{1,4}(\\^[A-Za-z0-9 ]{0,4}(&[a-z]{0,2})?){0,2}(~[A-Za-z0-9]{0,3}){0,2}",
            1..6,
        ),
    )
        .prop_map(|(name, fields)| format!("{}|{}", name, fields.join("|")))
}

proptest! {
    #[test]
    fn prop_parse_encode_round_trip(segments in prop::collection::vec(segment_strategy(), 0..6)) {
        let mut text = String::from("MSH|^~\\&|APP|FAC");
        for seg in &segments {
            text.push('\r');
            text.push_str(seg);
        }
        let msg = Message::parse(&text).expect("parse");
        prop_assert_eq!(msg.segments().len(), segments.len() + 1);
        prop_assert_eq!(msg.encode(), text.clone());
        prop_assert_eq!(msg.as_str(), text.as_str());
    }

    #[test]
    fn prop_set_then_get_returns_value(
        segment in prop::sample::select(vec!["PID", "NK1", "ZZZ"]),
        seq in 1usize..12,
        repetition in 0usize..3,
        component in 0usize..5,
        subcomponent in 0usize..4,
        value in "[A-Za-z0-9]{1,8}",
    ) {
        let mut msg = Message::parse(ADT_A01).expect("parse");
        let loc = Location {
            segment: segment.to_string(),
            field_seq: Some(seq),
            repetition: Some(repetition),
            component: hl7codec::Index::from_position(component),
            subcomponent: hl7codec::Index::from_position(subcomponent),
        };
        msg.set(&loc, &value).expect("set");
        prop_assert_eq!(msg.get(&loc).expect("get"), value.clone());
        let reparsed = Message::parse(msg.as_str()).expect("reparse");
        prop_assert_eq!(reparsed.get(&loc).expect("get after reparse"), value);
    }

    #[test]
    fn prop_round_trip_after_set(
        segments in prop::collection::vec(segment_strategy(), 0..4),
        target in prop::sample::select(vec!["MSH", "PID", "ZZZ"]),
        seq in 3usize..9,
        repetition in prop::option::of(0usize..3),
        component in 0usize..4,
        subcomponent in 0usize..3,
        value in "[A-Za-z0-9]{1,6}",
    ) {
        let mut text = String::from("MSH|^~\\&|APP|FAC");
        for seg in &segments {
            text.push('\r');
            text.push_str(seg);
        }
        let mut msg = Message::parse(&text).expect("parse");
        let loc = Location {
            segment: target.to_string(),
            field_seq: Some(seq),
            repetition,
            component: hl7codec::Index::from_position(component),
            subcomponent: hl7codec::Index::from_position(subcomponent),
        };
        msg.set(&loc, &value).expect("set");
        let reparsed = Message::parse(msg.as_str()).expect("reparse");
        prop_assert_eq!(reparsed.encode(), msg.encode());
        prop_assert_eq!(reparsed.segments(), msg.segments());
    }
}
