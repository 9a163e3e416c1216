//! RFC3339 timestamp validation.

use regex::Regex;
use std::sync::OnceLock;

const RFC3339_PATTERN: &str = r"^(-?(?:[1-9][0-9]*)?[0-9]{4})-(1[0-2]|0[1-9])-(3[01]|0[1-9]|[12][0-9])T(2[0-3]|[01][0-9]):([0-5][0-9]):([0-5][0-9])(\.[0-9]+)?(Z|[+-](?:2[0-3]|[01][0-9]):[0-5][0-9])?$";

fn rfc3339() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(RFC3339_PATTERN).unwrap_or_else(|e| panic!("RFC3339 pattern: {e}")))
}

/// True when `s` is an RFC3339 timestamp on a real calendar date. The offset may be omitted.
pub fn is_rfc3339(s: &str) -> bool {
    let Some(caps) = rfc3339().captures(s) else {
        return false;
    };
    let year = &caps[1];
    if year.len() != 4 {
        return true;
    }
    chrono::NaiveDate::parse_from_str(&format!("{}-{}-{}", year, &caps[2], &caps[3]), "%Y-%m-%d").is_ok()
}
