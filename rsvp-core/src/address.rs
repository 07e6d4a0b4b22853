//! Calendar user address normalization.
//!
//! Every address comparison in the crate goes through [`normalize_address`],
//! so `mailto:Bob@Example.com`, `bob@example.com` and
//! `/principals/bob@example.com/` all compare equal.

const MAILTO: &str = "mailto:";
const PRINCIPALS: &str = "principals/";

/// Canonical comparison key for a calendar user address.
///
/// Strips the `mailto:` scheme (any case) and any directory-path prefix ending
/// in `principals/`, trims surrounding slashes and whitespace, and lower-cases.
pub fn normalize_address(raw: &str) -> String {
    let mut address = raw.trim();

    if has_mailto(address) {
        address = &address[MAILTO.len()..];
    }

    let lowered = address.to_lowercase();
    let stripped = match lowered.rfind(PRINCIPALS) {
        Some(pos) => &lowered[pos + PRINCIPALS.len()..],
        None => lowered.as_str(),
    };

    stripped.trim_matches('/').trim().to_string()
}

/// True when both addresses normalize to the same key.
pub fn same_address(a: &str, b: &str) -> bool {
    normalize_address(a) == normalize_address(b)
}

/// The address without the `mailto:` scheme, original case preserved.
pub fn strip_scheme(raw: &str) -> &str {
    let raw = raw.trim();
    if has_mailto(raw) {
        &raw[MAILTO.len()..]
    } else {
        raw
    }
}

fn has_mailto(raw: &str) -> bool {
    raw.get(..MAILTO.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(MAILTO))
}

/// Local part of an address (`bob` for `bob@example.com`).
pub fn local_part(address: &str) -> &str {
    let address = strip_scheme(address);
    match address.rfind('@') {
        Some(pos) => &address[..pos],
        None => address,
    }
}

/// Domain of an address, lower-cased. `None` when there is no `@`.
pub fn domain(address: &str) -> Option<String> {
    let normalized = normalize_address(address);
    normalized
        .rfind('@')
        .map(|pos| normalized[pos + 1..].to_string())
        .filter(|d| !d.is_empty())
}
