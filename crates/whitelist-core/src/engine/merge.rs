//! Pure list operations used by the reconciler
//!
//! Nothing in here does I/O, so the merge invariants can be checked
//! directly.

use std::collections::HashSet;

/// Trim every entry, drop empty ones and drop duplicates
///
/// The first occurrence of each entry wins, so the output keeps input
/// order. Identifiers are compared case-sensitively.
pub fn clean<I, S>(entries: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut cleaned = Vec::new();

    for entry in entries {
        let entry = entry.as_ref().trim();
        if entry.is_empty() || !seen.insert(entry.to_string()) {
            continue;
        }
        cleaned.push(entry.to_string());
    }

    cleaned
}

/// Build the candidate whitelist for a pass
///
/// - No failed fetch: `clean(fetched) ∪ clean(manual)`; remote content fully
///   replaces what was there before.
/// - Any failed fetch: `current ∪ clean(fetched) ∪ clean(manual)`; entries of
///   `current` are kept verbatim so nothing already listed is lost.
pub fn merge(
    current: &[String],
    fetched: &[String],
    manual: &[String],
    any_failed: bool,
) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut candidate = Vec::new();

    if any_failed {
        for entry in current {
            if seen.insert(entry.clone()) {
                candidate.push(entry.clone());
            }
        }
    }

    for entry in clean(fetched).into_iter().chain(clean(manual)) {
        if seen.insert(entry.clone()) {
            candidate.push(entry);
        }
    }

    candidate
}

/// Order-insensitive comparison of two entry lists
pub fn same_entries(a: &[String], b: &[String]) -> bool {
    let a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let b: HashSet<&str> = b.iter().map(String::as_str).collect();
    a == b
}
