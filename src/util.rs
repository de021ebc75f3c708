// Parsing helpers and the named policies every aggregator shares.
//
// Free-text fields coming out of the store are never trusted: quantities are
// best-effort numbers and attribution falls back through a fixed chain, so the
// aggregators themselves never have to deal with missing or malformed input.
use crate::types::{DonationRecord, RequestRecord};
use num_format::{Locale, ToFormattedString};
use once_cell::sync::Lazy;
use regex::Regex;

static NUMERIC_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9]+(?:[.,][0-9]+)?").expect("numeric token pattern is valid")
});

/// Label used for donations that carry neither a contact nor a name.
pub const ANONYMOUS: &str = "Anonymous";

/// Extract a non-negative whole quantity from free text such as
/// `"30 plates"` or `"10,5 kg"`.
///
/// - Takes the first numeric token; `.` and `,` both act as decimal separator.
/// - Truncates toward zero.
/// - Returns `0` for missing, empty, or number-free input.
pub fn parse_quantity(s: Option<&str>) -> u64 {
    let Some(s) = s else {
        return 0;
    };
    let Some(token) = NUMERIC_TOKEN.find(s) else {
        return 0;
    };
    token
        .as_str()
        .replace(',', ".")
        .parse::<f64>()
        .map(|v| v.trunc() as u64)
        .unwrap_or(0)
}

/// How an extracted quantity is turned into an aggregation weight.
///
/// Totals and per-record weighting disagree on what an unparsable quantity is
/// worth, so both readings are kept as separate policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityPolicy {
    /// The extracted value as-is; unparsable text weighs `0`.
    Raw,
    /// Every record weighs at least `1`.
    AtLeastOne,
}

impl QuantityPolicy {
    pub fn weigh(self, quantity: Option<&str>) -> u64 {
        let extracted = parse_quantity(quantity);
        match self {
            QuantityPolicy::Raw => extracted,
            QuantityPolicy::AtLeastOne => extracted.max(1),
        }
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Identity used to count distinct donors: contact first, then display name.
pub fn donor_identity(d: &DonationRecord) -> Option<&str> {
    non_empty(d.donor_email.as_deref()).or_else(|| non_empty(d.donor_name.as_deref()))
}

/// Identity used to count distinct organizations: organization name first,
/// then requester contact.
pub fn organization_identity(r: &RequestRecord) -> Option<&str> {
    non_empty(r.org_name.as_deref()).or_else(|| non_empty(r.requester_email.as_deref()))
}

/// Grouping key for rankings. Never empty.
pub fn attribution_key(d: &DonationRecord) -> &str {
    donor_identity(d).unwrap_or(ANONYMOUS)
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Thin wrapper around `num-format` for counts printed to the console.
    n.to_formatted_string(&Locale::en)
}
