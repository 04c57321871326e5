//! Declarative presence/value rules evaluated against a parsed message.
//!
//! A failed rule is ordinary data, not an error. A rule is recorded once when its address
//! resolves to nothing, and once more for every resolved value that fails the check, so
//! the same rule can appear several times in the failure list.

use crate::location::Location;
use crate::message::Message;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    /// At least one non-empty value.
    Presence,
    /// Every value equals the expected value.
    SpecificValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Address text, e.g. `"MSH.9.1"`.
    pub location: String,
    pub check: Check,
    pub value: String,
}

impl Rule {
    pub fn presence(location: impl Into<String>) -> Self {
        Rule {
            location: location.into(),
            check: Check::Presence,
            value: String::new(),
        }
    }

    pub fn specific_value(location: impl Into<String>, value: impl Into<String>) -> Self {
        Rule {
            location: location.into(),
            check: Check::SpecificValue,
            value: value.into(),
        }
    }
}

impl Message {
    /// Check every rule. Returns the verdict and the failed rules in evaluation order.
    pub fn is_valid(&self, rules: &[Rule]) -> (bool, Vec<Rule>) {
        let mut failures = Vec::new();
        let mut valid = true;
        for rule in rules {
            let (values, resolved) = self.resolve_rule(&rule.location);
            if !resolved || values.is_empty() {
                valid = false;
                failures.push(rule.clone());
            }
            for value in &values {
                if value.is_empty() || (rule.check == Check::SpecificValue && *value != rule.value) {
                    debug!(location = %rule.location, value = %value, "rule failed");
                    valid = false;
                    failures.push(rule.clone());
                }
            }
        }
        (valid, failures)
    }

    /// Values at `address` from every matching segment that has them. The flag is false
    /// when the address or any segment lookup failed; values found elsewhere are kept.
    fn resolve_rule(&self, address: &str) -> (Vec<String>, bool) {
        let loc: Location = match address.parse() {
            Ok(loc) => loc,
            Err(e) => {
                debug!(location = %address, error = %e, "rule did not resolve");
                return (Vec::new(), false);
            }
        };
        if loc.targets_message() {
            return (vec![self.as_str().to_string()], true);
        }
        let segs = match self.all_segments(&loc.segment) {
            Ok(segs) => segs,
            Err(e) => {
                debug!(location = %address, error = %e, "rule did not resolve");
                return (Vec::new(), false);
            }
        };
        let mut values = Vec::new();
        let mut resolved = true;
        for seg in segs {
            match seg.get_all(&loc) {
                Ok(found) => values.extend(found),
                Err(e) => {
                    debug!(location = %address, error = %e, "rule did not resolve");
                    resolved = false;
                }
            }
        }
        (values, resolved)
    }
}
