//! Parse fuzz target: feed arbitrary text to the message parser and the address parser.
//! Neither may panic; lookups, writes, header re-encoding and the tree of whatever parsed
//! must not panic either.
//! Build with: cargo fuzz run parse_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let s = match std::str::from_utf8(data) {
        Ok(x) => x,
        Err(_) => return,
    };
    let _ = s.parse::<hl7codec::Location>();
    if let Ok(mut msg) = hl7codec::Message::parse(s) {
        let _ = msg.find_all("MSH.9.1");
        if let Ok(info) = msg.info() {
            let _ = hl7codec::Message::from_schema(&info);
        }
        let _ = msg.set_value("MSH.2.1", "x");
        let _ = msg.set_value("ZZZ.2[2].3.1", "x");
        let _ = msg.tree().to_string();
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run parse_fuzz");
}
