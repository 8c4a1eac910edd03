//! Membership and diff helpers for reconciliation.
//!
//! Name comparison is exact equality. A substring check would treat
//! "polA" as present in a binding that only names "polA2" and silently
//! skip its insert or delete.

/// Returns true if `name` appears in `names` (exact match).
pub fn contains_name(name: &str, names: &[String]) -> bool {
    names.iter().any(|n| n == name)
}

/// Returns the names in `from` that do not appear in `other`, preserving
/// order.
pub fn missing_from<'a>(from: &'a [String], other: &[String]) -> Vec<&'a str> {
    from.iter()
        .filter(|n| !contains_name(n, other))
        .map(String::as_str)
        .collect()
}
