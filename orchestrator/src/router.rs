//! Keyword router
//!
//! Picks the starting role for a task description by matching four fixed
//! keyword families against the text.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::Role;

/// Confidence reported when no keyword family matches at all
pub const FALLBACK_CONFIDENCE: f64 = 0.3;

static ARCHITECT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:architect|architecture|design|plan|structure|blueprint|schema|diagram)\b")
        .expect("Invalid architect pattern")
});

static REVIEWER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:review|audit|inspect|critique|evaluate|assess|verify|check)\b")
        .expect("Invalid reviewer pattern")
});

static NAVIGATOR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:help|explain|context|understand|navigate|where|why|how does|what is)\b")
        .expect("Invalid navigator pattern")
});

static IMPLEMENTER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:implement|build|create|write|code|add|fix|develop|refactor)\b")
        .expect("Invalid implementer pattern")
});

/// Keyword families in priority order. Earlier entries win ties.
fn families() -> [(Role, &'static Regex); 4] {
    [
        (Role::Architect, &*ARCHITECT_PATTERN),
        (Role::Reviewer, &*REVIEWER_PATTERN),
        (Role::Navigator, &*NAVIGATOR_PATTERN),
        (Role::Implementer, &*IMPLEMENTER_PATTERN),
    ]
}

/// Classifies task descriptions into a starting role
#[derive(Debug, Clone, Copy, Default)]
pub struct Router;

impl Router {
    pub fn new() -> Self {
        Self
    }

    /// Pick the first keyword family that matches, in priority order.
    /// Falls back to the implementer.
    pub fn route(&self, task: &str) -> Role {
        let role = families()
            .into_iter()
            .find(|(_, pattern)| pattern.is_match(task))
            .map(|(role, _)| role)
            .unwrap_or(Role::Implementer);

        tracing::info!(target: "audit", role = %role, task = %task, "Routed task");
        role
    }

    /// Pick the family with the most keyword hits and report its share of
    /// all hits as the confidence.
    pub fn route_with_confidence(&self, task: &str) -> (Role, f64) {
        let counts: Vec<(Role, usize)> = families()
            .into_iter()
            .map(|(role, pattern)| (role, pattern.find_iter(task).count()))
            .collect();

        let total: usize = counts.iter().map(|(_, count)| count).sum();
        if total == 0 {
            tracing::info!(
                target: "audit",
                role = %Role::Implementer,
                confidence = FALLBACK_CONFIDENCE,
                task = %task,
                "No routing keywords matched"
            );
            return (Role::Implementer, FALLBACK_CONFIDENCE);
        }

        // Strictly greater keeps the earliest family on ties
        let mut best = counts[0];
        for &(role, count) in &counts[1..] {
            if count > best.1 {
                best = (role, count);
            }
        }

        let confidence = best.1 as f64 / total as f64;
        tracing::info!(
            target: "audit",
            role = %best.0,
            confidence,
            matches = best.1,
            total,
            task = %task,
            "Routed task with confidence"
        );
        (best.0, confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_priority_order() {
        let router = Router::new();

        assert_eq!(router.route("Design the storage layer"), Role::Architect);
        assert_eq!(router.route("Please review my pull request"), Role::Reviewer);
        assert_eq!(router.route("Explain how the parser works"), Role::Navigator);
        assert_eq!(router.route("Implement a LRU cache"), Role::Implementer);

        // Architect wins over implementer even when listed later
        assert_eq!(router.route("Implement it after you design it"), Role::Architect);
    }

    #[test]
    fn test_route_is_case_insensitive() {
        let router = Router::new();
        assert_eq!(router.route("AUDIT the auth module"), Role::Reviewer);
    }

    #[test]
    fn test_implementer_only_keywords() {
        let router = Router::new();
        for task in [
            "Implement a token bucket",
            "build and write the parser",
            "fix the flaky test",
            "add retries to the client",
        ] {
            assert_eq!(router.route(task), Role::Implementer, "task: {}", task);
            let (role, confidence) = router.route_with_confidence(task);
            assert_eq!(role, Role::Implementer);
            assert!((confidence - 1.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn test_no_keywords_falls_back() {
        let router = Router::new();
        let task = "Sourdough starter feeding schedule";

        assert_eq!(router.route(task), Role::Implementer);
        let (role, confidence) = router.route_with_confidence(task);
        assert_eq!(role, Role::Implementer);
        assert!(confidence <= 0.3);
    }

    #[test]
    fn test_confidence_counts_all_matches() {
        let router = Router::new();
        // implementer: implement, build, write (3) vs architect: design (1)
        let (role, confidence) =
            router.route_with_confidence("Implement the design, build it and write tests");
        assert_eq!(role, Role::Implementer);
        assert!((confidence - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_ties_prefer_priority_order() {
        let router = Router::new();
        let (role, confidence) = router.route_with_confidence("review the design");
        assert_eq!(role, Role::Architect);
        assert!((confidence - 0.5).abs() < 1e-9);

        let (role, _) = router.route_with_confidence("explain then fix");
        assert_eq!(role, Role::Navigator);
    }

    #[test]
    fn test_word_boundaries() {
        let router = Router::new();
        // "checkout" and "addressed" must not count as keywords
        let (role, confidence) = router.route_with_confidence("checkout page addressed");
        assert_eq!(role, Role::Implementer);
        assert!((confidence - FALLBACK_CONFIDENCE).abs() < 1e-9);
    }
}
