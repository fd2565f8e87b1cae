//! Agent output protocol
//!
//! Model output is free text with a few machine-readable lines:
//!
//! - `NEXT: <role|done>` names who works next (the last one wins)
//! - `VERDICT: APPROVED | CHANGES_REQUESTED` from the reviewer
//! - fenced code blocks carry the implementer's code
//!
//! Anything missing falls back to the role's default successor, so a model
//! that ignores the protocol still moves the workflow forward.

use std::collections::HashMap;
use std::sync::LazyLock;

use orchestrator::types::{CODE, DESIGN_DOC, NOTES, REVIEW_FEEDBACK};
use orchestrator::{AgentResponse, NextRole, Role};
use regex::Regex;

static NEXT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*NEXT:[ \t]*([A-Za-z_]+)[ \t]*\.?[ \t]*$").expect("Invalid next regex")
});

static VERDICT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*VERDICT:[ \t]*\[?([A-Za-z_ ]+?)\]?[ \t]*$")
        .expect("Invalid verdict regex")
});

static CODE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_+.\-]*[ \t]*\r?\n(.*?)```").expect("Invalid code block regex")
});

// Reasoning models wrap their scratch work in these tags
static THINK_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("Invalid think tag regex"));

/// Artifact key holding the reviewer's verdict
pub const VERDICT: &str = "verdict";

/// Reviewer decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Approved,
    ChangesRequested,
}

impl Verdict {
    fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "approved" | "approve" | "lgtm" => Some(Verdict::Approved),
            "changes_requested" | "request_changes" | "changes" | "rejected" => {
                Some(Verdict::ChangesRequested)
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Approved => "approved",
            Verdict::ChangesRequested => "changes_requested",
        }
    }
}

/// What an agent's raw output means for the workflow
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedOutput {
    /// Output with protocol lines and think blocks removed
    pub content: String,
    pub next: NextRole,
    pub verdict: Option<Verdict>,
    /// Concatenated fenced code blocks, if any
    pub code: Option<String>,
}

/// Read a role's raw output
pub fn parse_output(role: Role, raw: &str) -> ParsedOutput {
    let text = THINK_TAG.replace_all(raw, "");

    let verdict = VERDICT_LINE
        .captures_iter(&text)
        .filter_map(|caps| Verdict::parse(&caps[1]))
        .last();

    let requested = NEXT_LINE
        .captures_iter(&text)
        .last()
        .and_then(|caps| parse_next(&caps[1]));

    let next = requested.unwrap_or_else(|| match (role, verdict) {
        (Role::Reviewer, Some(Verdict::Approved)) => NextRole::Done,
        (Role::Reviewer, Some(Verdict::ChangesRequested)) => NextRole::Continue(Role::Implementer),
        _ => role.default_successor(),
    });

    let blocks: Vec<&str> = CODE_BLOCK
        .captures_iter(&text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim_end())
        .filter(|block| !block.trim().is_empty())
        .collect();
    let code = (!blocks.is_empty()).then(|| blocks.join("\n\n"));

    let without_next = NEXT_LINE.replace_all(&text, "");
    let content = VERDICT_LINE.replace_all(&without_next, "").trim().to_string();

    ParsedOutput {
        content,
        next,
        verdict,
        code,
    }
}

fn parse_next(raw: &str) -> Option<NextRole> {
    let name = raw.trim().to_lowercase();
    if name == "done" {
        return Some(NextRole::Done);
    }
    match name.parse::<Role>() {
        Ok(role) => Some(NextRole::Continue(role)),
        Err(e) => {
            tracing::warn!(next = %name, "Ignoring NEXT line: {}", e);
            None
        }
    }
}

impl ParsedOutput {
    /// Artifacts this role contributes
    pub fn artifacts(&self, role: Role) -> HashMap<String, serde_json::Value> {
        let mut bag = HashMap::new();
        match role {
            Role::Architect => {
                bag.insert(DESIGN_DOC.to_string(), self.content.clone().into());
            }
            Role::Implementer => {
                let code = self.code.clone().unwrap_or_else(|| self.content.clone());
                bag.insert(CODE.to_string(), code.into());
            }
            Role::Reviewer => {
                bag.insert(REVIEW_FEEDBACK.to_string(), self.content.clone().into());
                if let Some(verdict) = self.verdict {
                    bag.insert(VERDICT.to_string(), verdict.as_str().into());
                }
            }
            Role::Navigator => {
                bag.insert(NOTES.to_string(), self.content.clone().into());
            }
            Role::Human => {}
        }
        bag
    }

    /// Build the engine response for `role`
    pub fn into_response(self, role: Role) -> AgentResponse {
        let artifacts = self.artifacts(role);
        let mut response = AgentResponse::new(self.content, self.next);
        response.artifacts = artifacts;
        response
    }
}

/// Rough token count for text when the model does not report usage
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_line_wins() {
        let parsed = parse_output(
            Role::Architect,
            "## Overview\nA cache.\n\nNEXT: human\n",
        );
        assert_eq!(parsed.next, NextRole::Continue(Role::Human));
        assert_eq!(parsed.content, "## Overview\nA cache.");
    }

    #[test]
    fn test_last_next_line_counts() {
        let parsed = parse_output(Role::Navigator, "NEXT: architect\nmore thoughts\nnext: Done.");
        assert_eq!(parsed.next, NextRole::Done);
        assert_eq!(parsed.content, "more thoughts");
    }

    #[test]
    fn test_missing_or_unknown_next_falls_back() {
        let parsed = parse_output(Role::Implementer, "```rust\nfn a() {}\n```");
        assert_eq!(parsed.next, NextRole::Continue(Role::Reviewer));

        let parsed = parse_output(Role::Architect, "design\nNEXT: tester");
        assert_eq!(parsed.next, NextRole::Continue(Role::Implementer));
    }

    #[test]
    fn test_reviewer_verdict_drives_next() {
        let parsed = parse_output(Role::Reviewer, "Looks good.\nVERDICT: APPROVED");
        assert_eq!(parsed.verdict, Some(Verdict::Approved));
        assert_eq!(parsed.next, NextRole::Done);
        assert_eq!(parsed.content, "Looks good.");

        let parsed = parse_output(Role::Reviewer, "Missing tests.\nVERDICT: [CHANGES REQUESTED]");
        assert_eq!(parsed.verdict, Some(Verdict::ChangesRequested));
        assert_eq!(parsed.next, NextRole::Continue(Role::Implementer));

        // An explicit NEXT overrides the verdict
        let parsed = parse_output(Role::Reviewer, "VERDICT: CHANGES_REQUESTED\nNEXT: human");
        assert_eq!(parsed.next, NextRole::Continue(Role::Human));
    }

    #[test]
    fn test_code_blocks_collected() {
        let raw = "Here:\n```rust\nfn a() {}\n```\nand\n```\nfn b() {}\n```\nNEXT: reviewer";
        let parsed = parse_output(Role::Implementer, raw);
        assert_eq!(parsed.code.as_deref(), Some("fn a() {}\n\nfn b() {}"));

        let bag = parsed.artifacts(Role::Implementer);
        assert_eq!(bag[CODE], "fn a() {}\n\nfn b() {}");
    }

    #[test]
    fn test_think_blocks_stripped() {
        let parsed = parse_output(
            Role::Architect,
            "<think>NEXT: done\nhmm</think>\nThe design.\nNEXT: implementer",
        );
        assert_eq!(parsed.next, NextRole::Continue(Role::Implementer));
        assert_eq!(parsed.content, "The design.");
    }

    #[test]
    fn test_role_artifacts() {
        let design = parse_output(Role::Architect, "# Design").into_response(Role::Architect);
        assert_eq!(design.artifacts[DESIGN_DOC], "# Design");

        let review = parse_output(Role::Reviewer, "ok\nVERDICT: APPROVED").into_response(Role::Reviewer);
        assert_eq!(review.artifacts[REVIEW_FEEDBACK], "ok");
        assert_eq!(review.artifacts[VERDICT], "approved");

        let notes = parse_output(Role::Navigator, "lives in src/db").into_response(Role::Navigator);
        assert_eq!(notes.artifacts[NOTES], "lives in src/db");
        assert!(notes.next.is_done());
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }
}
