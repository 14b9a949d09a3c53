//! Syntactic checks applied to tool arguments before any network call.
//!
//! IPv6 support is deliberately narrow: only the full eight-group form plus the
//! literals `::1` and `::` are accepted. Compressed forms such as `2001:db8::1`
//! are rejected, which keeps behavior compatible with the existing tool.

use regex::Regex;
use std::sync::OnceLock;

const IPV4_PATTERN: &str = r"^(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)$";
const IPV6_PATTERN: &str = r"^(?:[0-9a-fA-F]{1,4}:){7}[0-9a-fA-F]{1,4}$|^::1$|^::$";
// ASCII only; `\d` would also admit other Unicode digits.
const CATEGORIES_PATTERN: &str = r"^[0-9]+(,[0-9]+)*$";

fn ipv4_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(IPV4_PATTERN).expect("IPv4 pattern is valid"))
}

fn ipv6_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(IPV6_PATTERN).expect("IPv6 pattern is valid"))
}

fn categories_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(CATEGORIES_PATTERN).expect("categories pattern is valid"))
}

/// Returns true if `ip` is a dotted-quad IPv4 address or a full-form IPv6 address.
pub fn validate_ip(ip: &str) -> bool {
    if ip.is_empty() {
        return false;
    }
    ipv4_regex().is_match(ip) || ipv6_regex().is_match(ip)
}

/// Returns true if `categories` is one or more digit runs joined by single commas.
pub fn validate_categories(categories: &str) -> bool {
    if categories.is_empty() {
        return false;
    }
    categories_regex().is_match(categories)
}
