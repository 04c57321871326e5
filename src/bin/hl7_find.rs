//! Print values from one HL7 message.
//!
//! Usage:
//!   hl7_find [OPTIONS] FILE [ADDRESS ...]
//!   hl7_find [OPTIONS] - [ADDRESS ...] < message.hl7
//!
//! Prints every value found at each address, one per line. Addresses that resolve to
//! nothing are reported on stderr and make the exit status non-zero.
//!
//! Options:
//!   --lf       Line feed also terminates segments
//!   --tree     Print the whole message as an addressed tree
//!
//! Logging goes to stderr and is controlled by RUST_LOG (e.g. RUST_LOG=hl7codec=debug).

use anyhow::Context;
use hl7codec::{Message, ParseOptions};
use std::io::{self, Read};
use tracing_subscriber::prelude::*;

fn take_flag(args: &mut Vec<String>, flag: &str) -> bool {
    match args.iter().position(|a| a == flag) {
        Some(pos) => {
            args.remove(pos);
            true
        }
        None => false,
    }
}

fn read_input(path: &str) -> anyhow::Result<String> {
    let mut bytes = Vec::new();
    if path == "-" {
        io::stdin()
            .read_to_end(&mut bytes)
            .context("reading stdin")?;
    } else {
        bytes = std::fs::read(path).with_context(|| format!("reading {}", path))?;
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hl7codec=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let lf = take_flag(&mut args, "--lf");
    let tree = take_flag(&mut args, "--tree");
    if args.is_empty() {
        anyhow::bail!("usage: hl7_find [--lf] [--tree] FILE [ADDRESS ...]");
    }
    let path = args.remove(0);

    let text = read_input(&path)?;
    let options = ParseOptions::default().with_lf_terminator(lf);
    let message = Message::parse_with(&text, &options).with_context(|| format!("parsing {}", path))?;

    if tree || args.is_empty() {
        print!("{}", message.tree());
    }

    let mut missing = 0usize;
    for address in &args {
        match message.find_all(address) {
            Ok(values) => {
                for value in values {
                    println!("{}", value);
                }
            }
            Err(e) if e.is_lookup() => {
                eprintln!("{}: {}", address, e);
                missing += 1;
            }
            Err(e) => return Err(e).with_context(|| format!("address {}", address)),
        }
    }
    if missing > 0 {
        anyhow::bail!("{} address(es) not found", missing);
    }
    Ok(())
}
