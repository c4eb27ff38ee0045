//! Single-wildcard metric name matching.
//!
//! Patterns contain at most one `*`, which stands for any run of characters
//! (including none). `service.*.health` matches `service.api.health` but not
//! `services.api.health`. The match is a prefix/suffix split around the
//! wildcard, so cost is bounded by the metric name length.

/// Returns true if `name` matches `pattern`.
///
/// A pattern without `*` must match exactly. A lone `*` matches everything.
pub fn matches(pattern: &str, name: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == name,
        Some((prefix, suffix)) => {
            name.len() >= prefix.len() + suffix.len()
                && name.starts_with(prefix)
                && name.ends_with(suffix)
        }
    }
}

/// Validates that a pattern contains at most one wildcard.
pub fn is_valid(pattern: &str) -> bool {
    !pattern.is_empty() && pattern.matches('*').count() <= 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_without_wildcard() {
        assert!(matches("system.cpu.usage", "system.cpu.usage"));
        assert!(!matches("system.cpu.usage", "system.cpu.usage.core0"));
        assert!(!matches("system.cpu.usage", "system.cpu"));
    }

    #[test]
    fn wildcard_middle_segment() {
        assert!(matches("service.*.health", "service.content_engine.health"));
        assert!(matches("service.*.health", "service.platform_manager.health"));
        assert!(!matches("service.*.health", "services.content_engine.health"));
        assert!(!matches("service.*.health", "service.content_engine.latency"));
    }

    #[test]
    fn wildcard_matches_empty_middle() {
        assert!(matches("service.*health", "service.health"));
        // Prefix and suffix must not overlap in the candidate.
        assert!(!matches("service.*.health", "service.health"));
    }

    #[test]
    fn lone_wildcard_matches_everything() {
        assert!(matches("*", "anything.at.all"));
        assert!(matches("*", ""));
    }

    #[test]
    fn validity_allows_at_most_one_wildcard() {
        assert!(is_valid("system.cpu.usage"));
        assert!(is_valid("service.*.health"));
        assert!(is_valid("*"));
        assert!(!is_valid("service.*.*.health"));
        assert!(!is_valid(""));
    }
}
