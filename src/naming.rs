//! Resource name generation.
//!
//! Resources that accept `name` or `name_prefix` resolve the final name here.
//! Generated suffixes are a zero-padded microsecond timestamp followed by a
//! hex counter, so names produced by one process sort in creation order.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Length of the suffix appended to a `name_prefix`.
pub const UNIQUE_ID_SUFFIX_LENGTH: usize = 26;

/// Prefix used when neither `name` nor `name_prefix` is configured.
pub const UNIQUE_ID_PREFIX: &str = "hemmer-";

/// Earliest timestamp a generated suffix can carry (2024-01-01T00:00:00Z, in µs).
const EARLIEST_SUFFIX_MICROS: u64 = 1_704_067_200_000_000;

/// Slack allowed for clock skew when recognising a generated suffix.
const SUFFIX_CLOCK_SKEW_MICROS: u64 = 86_400 * 1_000_000;

static COUNTER: AtomicU32 = AtomicU32::new(0);

fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_micros()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

/// Returns `prefix` followed by a unique [`UNIQUE_ID_SUFFIX_LENGTH`]-character suffix.
pub fn prefixed_unique_id(prefix: &str) -> String {
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}{:018}{:08x}", prefix, now_micros() % 10u64.pow(18), counter)
}

/// Resolve the name for a new resource.
///
/// An explicit name wins, then a prefix with a generated suffix, then the
/// default prefix.
pub fn resolve_name(name: Option<&str>, name_prefix: Option<&str>) -> String {
    match (name, name_prefix) {
        (Some(name), _) if !name.is_empty() => name.to_string(),
        (_, Some(prefix)) if !prefix.is_empty() => prefixed_unique_id(prefix),
        _ => prefixed_unique_id(UNIQUE_ID_PREFIX),
    }
}

/// The prefix a generated name was built from, if it has the generated shape.
pub fn name_prefix_from_name(name: &str) -> Option<&str> {
    let split = name.len().checked_sub(UNIQUE_ID_SUFFIX_LENGTH)?;
    if !name.is_char_boundary(split) || !name[split..].is_ascii() {
        return None;
    }
    let (prefix, suffix) = name.split_at(split);
    let (digits, hex) = suffix.split_at(18);
    if !digits.bytes().all(|b| b.is_ascii_digit())
        || !hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    {
        return None;
    }
    // Only a timestamp this crate could have written counts as generated.
    let micros: u64 = digits.parse().ok()?;
    let latest = now_micros().saturating_add(SUFFIX_CLOCK_SKEW_MICROS);
    (EARLIEST_SUFFIX_MICROS..=latest)
        .contains(&micros)
        .then_some(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_length() {
        let id = prefixed_unique_id("tf-");
        assert!(id.starts_with("tf-"));
        assert_eq!(id.len(), 3 + UNIQUE_ID_SUFFIX_LENGTH);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = prefixed_unique_id("x");
        let b = prefixed_unique_id("x");
        assert_ne!(a, b);
    }

    #[test]
    fn test_resolve_name() {
        assert_eq!(resolve_name(Some("explicit"), Some("ignored-")), "explicit");

        let generated = resolve_name(None, Some("pre-"));
        assert!(generated.starts_with("pre-"));
        assert_eq!(generated.len(), 4 + UNIQUE_ID_SUFFIX_LENGTH);

        assert!(resolve_name(None, None).starts_with(UNIQUE_ID_PREFIX));
        assert!(resolve_name(Some(""), None).starts_with(UNIQUE_ID_PREFIX));
    }

    #[test]
    fn test_name_prefix_from_name() {
        let generated = prefixed_unique_id("events-");
        assert_eq!(name_prefix_from_name(&generated), Some("events-"));
        assert_eq!(name_prefix_from_name("short"), None);
        assert_eq!(
            name_prefix_from_name("a-name-that-is-clearly-handwritten-by-someone"),
            None
        );
    }

    #[test]
    fn test_name_prefix_from_name_rejects_implausible_timestamps() {
        // Right shape, but the timestamps are far in the past or future.
        assert_eq!(
            name_prefix_from_name("orders-000000000000000001deadbeef"),
            None
        );
        assert_eq!(
            name_prefix_from_name("orders-123456789012345678abcdef01"),
            None
        );

        let recent = format!("orders-{:018}{:08x}", EARLIEST_SUFFIX_MICROS + 1, 7);
        assert_eq!(name_prefix_from_name(&recent), Some("orders-"));
    }
}
