//! Topic wildcard matching
//!
//! Topics and patterns are `/`-separated segment sequences:
//! - `+` matches exactly one segment
//! - `#` matches zero or more trailing segments and must be the last segment
//!
//! A `#` anywhere but the final segment, or an empty pattern, never matches.
//! Wildcard characters embedded in a longer segment (`a+`, `b#`) are literal.

/// Check whether a concrete topic matches a subscription pattern
pub fn matches(topic: &str, pattern: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }

    let pattern_parts: Vec<&str> = pattern.split('/').collect();
    let last = pattern_parts.len() - 1;

    // `#` is only meaningful as the final segment
    if pattern_parts[..last].iter().any(|p| *p == "#") {
        return false;
    }

    if topic == pattern {
        return true;
    }

    let mut topic_parts = topic.split('/');

    for (i, part) in pattern_parts.iter().enumerate() {
        if *part == "#" && i == last {
            return true;
        }

        match topic_parts.next() {
            Some(segment) if *part == "+" || *part == segment => {}
            _ => return false,
        }
    }

    topic_parts.next().is_none()
}

/// Whether a pattern contains any wildcard segment
pub fn is_wildcard(pattern: &str) -> bool {
    pattern.split('/').any(|p| p == "+" || p == "#")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact() {
        assert!(matches("a/b/c", "a/b/c"));
        assert!(!matches("a/b/c", "a/b/d"));
        assert!(!matches("a/b", "a/b/c"));
        assert!(!matches("a/b/c", "a/b"));
    }

    #[test]
    fn test_single_level() {
        assert!(matches("a/b/c", "a/+/c"));
        assert!(!matches("a/b", "a/+/c"));
        assert!(matches("x/y", "x/+"));
        assert!(!matches("x/y/z", "x/+"));
        assert!(matches("a/b/c", "+/+/+"));
        assert!(matches("a//c", "a/+/c"));
    }

    #[test]
    fn test_multi_level() {
        assert!(matches("a/b/c", "a/#"));
        assert!(matches("a", "a/#"));
        assert!(matches("anything/at/all", "#"));
        assert!(matches("a/b/c", "a/+/#"));
        assert!(!matches("b/c", "a/#"));
    }

    #[test]
    fn test_hash_not_final_never_matches() {
        assert!(!matches("a/b/c", "a/#/c"));
        assert!(!matches("a/x/c", "#/x/c"));
    }

    #[test]
    fn test_malformed_and_literal() {
        assert!(!matches("a", ""));
        assert!(!matches("ab/c", "a+/c"));
        assert!(matches("a+/c", "a+/c"));
        assert!(!matches("a/bc", "a/b#"));
    }

    #[test]
    fn test_is_wildcard() {
        assert!(is_wildcard("x/+"));
        assert!(is_wildcard("x/#"));
        assert!(is_wildcard("+"));
        assert!(!is_wildcard("x/y"));
        assert!(!is_wildcard("x/a+"));
    }
}
