//! Firmware Version Ordering
//!
//! Versions are expected in `major[.minor[.patch]]` form. Missing trailing
//! segments count as zero, so `1.0` and `1.0.0` name the same release.
//! Anything that does not parse that way is ordered as a plain string.

use std::cmp::Ordering;

const MAX_SEGMENTS: usize = 3;

/// Parse up to three dot-separated integer segments.
fn parse(version: &str) -> Option<[i64; MAX_SEGMENTS]> {
    let mut segments = [0i64; MAX_SEGMENTS];
    for (i, part) in version.split('.').enumerate() {
        let slot = segments.get_mut(i)?;
        *slot = part.parse().ok()?;
    }
    Some(segments)
}

/// Compare two version strings.
///
/// When both sides parse, segments are compared numerically (major, then
/// minor, then patch). If either side fails to parse, both fall back to
/// byte-wise string ordering. Mixing numeric and free-form versions in one
/// list can therefore produce an intransitive order.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (parse(a), parse(b)) {
        (Some(pa), Some(pb)) => pa.cmp(&pb),
        _ => a.cmp(b),
    }
}

/// Check if version A is newer than version B
pub fn is_newer_version(a: &str, b: &str) -> bool {
    compare_versions(a, b) == Ordering::Greater
}

/// Sort items newest first by the version returned from `key`.
///
/// The sort is stable: items with equal versions keep their relative order.
pub fn sort_newest_first<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> &str,
{
    items.sort_by(|a, b| compare_versions(key(b), key(a)));
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        "0", "1", "1.0", "1.0.0", "1.0.1", "1.2", "1.2.3", "1.3.0", "1.10", "2.0.9", "2.1",
        "10.0.0", "0.0.1",
    ];

    #[test]
    fn test_concrete_orderings() {
        assert_eq!(compare_versions("1.0", "1.0.0"), Ordering::Equal);
        assert_eq!(compare_versions("2.1", "2.0.9"), Ordering::Greater);
        assert_eq!(compare_versions("1.2.3", "1.3.0"), Ordering::Less);
        assert_eq!(compare_versions("1.10", "1.9"), Ordering::Greater);
        assert_eq!(compare_versions("10.0.0", "9.9.9"), Ordering::Greater);
    }

    #[test]
    fn test_antisymmetric_and_reflexive() {
        for a in SAMPLES {
            assert_eq!(compare_versions(a, a), Ordering::Equal, "{a} vs itself");
            for b in SAMPLES {
                assert_eq!(
                    compare_versions(a, b),
                    compare_versions(b, a).reverse(),
                    "{a} vs {b}"
                );
            }
        }
    }

    #[test]
    fn test_unparseable_falls_back_to_string_order() {
        // Four segments is outside the numeric form
        assert_eq!(compare_versions("1.0.0.1", "1.0.0.1"), Ordering::Equal);
        assert_eq!(compare_versions("1.0.0.1", "1.0.0.2"), Ordering::Less);
        // One bad side drags the other into string comparison as well
        assert_eq!(compare_versions("1.10", "beta"), Ordering::Less);
        assert_eq!(compare_versions("v2", "1.0"), Ordering::Greater);
        assert_eq!(compare_versions("", "0"), Ordering::Less);
        assert_eq!(compare_versions("1..2", "1.0.2"), Ordering::Less);
    }

    #[test]
    fn test_is_newer_version() {
        assert!(is_newer_version("0.2.0", "0.1.0"));
        assert!(is_newer_version("1.0.0", "0.9.9"));
        assert!(!is_newer_version("1.0", "1.0.0"));
        assert!(!is_newer_version("0.1.0", "0.2.0"));
    }

    #[test]
    fn test_sort_newest_first() {
        let mut versions = vec!["1.0.0", "2.3.1", "1.9.9", "2.3", "0.9"];
        sort_newest_first(&mut versions, |v| *v);
        assert_eq!(versions, vec!["2.3.1", "2.3", "1.9.9", "1.0.0", "0.9"]);
    }

    #[test]
    fn test_sort_keeps_equal_versions_in_place() {
        let mut versions = vec![("1.0", 'a'), ("1.0.0", 'b'), ("2", 'c')];
        sort_newest_first(&mut versions, |v| v.0);
        assert_eq!(versions, vec![("2", 'c'), ("1.0", 'a'), ("1.0.0", 'b')]);
    }
}
