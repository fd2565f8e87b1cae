//! Shared data model
//!
//! Value types passed between the router, the workflow loop, agents,
//! hooks and the persistence layer. Nothing in here performs I/O.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Roles
// ============================================================================

/// A participant archetype the workflow routes control to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Architect,
    Implementer,
    Reviewer,
    Navigator,
    Human,
}

impl Role {
    /// All roles, in routing priority order (human last)
    pub const ALL: [Role; 5] = [
        Role::Architect,
        Role::Reviewer,
        Role::Navigator,
        Role::Implementer,
        Role::Human,
    ];

    /// Lowercase name, as used in storage and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Architect => "architect",
            Role::Implementer => "implementer",
            Role::Reviewer => "reviewer",
            Role::Navigator => "navigator",
            Role::Human => "human",
        }
    }

    /// Where control goes after this role when nothing says otherwise
    pub fn default_successor(&self) -> NextRole {
        match self {
            Role::Architect => NextRole::Continue(Role::Implementer),
            Role::Implementer => NextRole::Continue(Role::Reviewer),
            Role::Reviewer | Role::Navigator | Role::Human => NextRole::Done,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a role name is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "architect" => Ok(Role::Architect),
            "implementer" => Ok(Role::Implementer),
            "reviewer" => Ok(Role::Reviewer),
            "navigator" => Ok(Role::Navigator),
            "human" => Ok(Role::Human),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// What an agent wants to happen after it finishes
///
/// `Done` is the only way a workflow completes successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextRole {
    /// Hand control to another role
    Continue(Role),
    /// The work is finished
    Done,
}

impl NextRole {
    /// The role to continue with, if any
    pub fn role(&self) -> Option<Role> {
        match self {
            NextRole::Continue(role) => Some(*role),
            NextRole::Done => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, NextRole::Done)
    }
}

impl fmt::Display for NextRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NextRole::Continue(role) => write!(f, "{}", role),
            NextRole::Done => f.write_str("done"),
        }
    }
}

// ============================================================================
// Tasks
// ============================================================================

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Error returned when a task status string is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for TaskStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// One unit of work submitted by the operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub status: TaskStatus,
}

impl Task {
    /// Create a pending task with a fresh id
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            description: description.into(),
            created_at: Utc::now(),
            status: TaskStatus::Pending,
        }
    }
}

// ============================================================================
// Handoffs
// ============================================================================

/// What the receiving agent is told about the work
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    /// Current instruction. Starts as the task description and is replaced
    /// by each agent's output as control moves on.
    pub task_description: String,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub files_in_scope: Vec<String>,
}

impl Context {
    pub fn new(task_description: impl Into<String>) -> Self {
        Self {
            task_description: task_description.into(),
            ..Default::default()
        }
    }
}

/// Work products accumulated across the run
///
/// Fields are only ever set or overwritten with non-empty values; see
/// [`Artifacts::merge`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artifacts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub design_doc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Keys agents return that have no dedicated field
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Known artifact keys in an agent's artifact bag
pub const DESIGN_DOC: &str = "design_doc";
pub const CODE: &str = "code";
pub const REVIEW_FEEDBACK: &str = "review_feedback";
pub const NOTES: &str = "notes";

impl Artifacts {
    /// Merge an agent's artifact bag by presence.
    ///
    /// A key overwrites the accumulated value only when the new value is
    /// non-empty. Absent or empty values never erase anything. Returns the
    /// names of the keys that changed.
    pub fn merge(&mut self, bag: &HashMap<String, serde_json::Value>) -> Vec<String> {
        let mut changed = Vec::new();

        // Deterministic order so callers see stable change lists
        let mut keys: Vec<&String> = bag.keys().collect();
        keys.sort();

        for key in keys {
            let value = &bag[key];
            if is_empty_value(value) {
                continue;
            }

            let slot = match key.as_str() {
                DESIGN_DOC => Some(&mut self.design_doc),
                CODE => Some(&mut self.code),
                REVIEW_FEEDBACK => Some(&mut self.review_feedback),
                NOTES => Some(&mut self.notes),
                _ => None,
            };

            match slot {
                Some(field) => {
                    let text = value_text(value);
                    if field.as_deref() != Some(text.as_str()) {
                        *field = Some(text);
                        changed.push(key.clone());
                    }
                }
                None => {
                    if self.extra.get(key) != Some(value) {
                        self.extra.insert(key.clone(), value.clone());
                        changed.push(key.clone());
                    }
                }
            }
        }

        changed
    }

    /// Whether nothing has been produced yet
    pub fn is_empty(&self) -> bool {
        self.design_doc.is_none()
            && self.code.is_none()
            && self.review_feedback.is_none()
            && self.notes.is_none()
            && self.extra.is_empty()
    }
}

fn is_empty_value(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.trim().is_empty(),
        serde_json::Value::Array(items) => items.is_empty(),
        serde_json::Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Execution details for the step that produced a handoff
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub tokens_used: u64,
    #[serde(default)]
    pub model: String,
    #[serde(default, with = "duration_millis")]
    pub duration: Duration,
}

/// Record of one workflow step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handoff {
    pub task_id: String,
    pub timestamp: DateTime<Utc>,
    pub from_role: Role,
    pub to_role: Role,
    #[serde(default)]
    pub context: Context,
    #[serde(default)]
    pub artifacts: Artifacts,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Handoff {
    pub fn new(
        task_id: impl Into<String>,
        from_role: Role,
        to_role: Role,
        context: Context,
        artifacts: Artifacts,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            timestamp: Utc::now(),
            from_role,
            to_role,
            context,
            artifacts,
            metadata: Metadata::default(),
        }
    }
}

// ============================================================================
// Agent responses
// ============================================================================

/// Output of one agent execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub content: String,
    #[serde(default)]
    pub artifacts: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub tokens_used: u64,
    #[serde(default)]
    pub model: String,
    #[serde(default, with = "duration_millis")]
    pub duration: Duration,
    pub next: NextRole,
}

impl AgentResponse {
    pub fn new(content: impl Into<String>, next: NextRole) -> Self {
        Self {
            content: content.into(),
            artifacts: HashMap::new(),
            tokens_used: 0,
            model: String::new(),
            duration: Duration::ZERO,
            next,
        }
    }

    /// Add an entry to the artifact bag
    pub fn with_artifact(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.artifacts.insert(key.into(), value.into());
        self
    }

    pub fn with_tokens(mut self, tokens_used: u64) -> Self {
        self.tokens_used = tokens_used;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Stand-in for an agent that was skipped by the operator.
    /// Passes the instruction through and follows the default protocol.
    pub fn skipped(handoff: &Handoff) -> Self {
        Self::new(
            handoff.context.task_description.clone(),
            handoff.to_role.default_successor(),
        )
    }

    /// Execution metadata for the handoff this response completes
    pub fn metadata(&self) -> Metadata {
        Metadata {
            tokens_used: self.tokens_used,
            model: self.model.clone(),
            duration: self.duration,
        }
    }
}

/// Serialize Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bag(pairs: &[(&str, serde_json::Value)]) -> HashMap<String, serde_json::Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_role_parse_and_display() {
        assert_eq!("Reviewer".parse::<Role>().unwrap(), Role::Reviewer);
        assert_eq!(" navigator ".parse::<Role>().unwrap(), Role::Navigator);
        assert!("tester".parse::<Role>().is_err());
        assert_eq!(Role::Architect.to_string(), "architect");
    }

    #[test]
    fn test_default_successors() {
        assert_eq!(
            Role::Architect.default_successor(),
            NextRole::Continue(Role::Implementer)
        );
        assert_eq!(
            Role::Implementer.default_successor(),
            NextRole::Continue(Role::Reviewer)
        );
        assert!(Role::Reviewer.default_successor().is_done());
        assert!(Role::Navigator.default_successor().is_done());
    }

    #[test]
    fn test_merge_sets_known_fields_and_extra() {
        let mut artifacts = Artifacts::default();
        let changed = artifacts.merge(&bag(&[
            ("design_doc", json!("# Design")),
            ("test_plan", json!(["unit", "e2e"])),
        ]));

        assert_eq!(artifacts.design_doc.as_deref(), Some("# Design"));
        assert_eq!(artifacts.extra["test_plan"], json!(["unit", "e2e"]));
        assert_eq!(changed, vec!["design_doc", "test_plan"]);
    }

    #[test]
    fn test_merge_never_clears_with_empty_values() {
        let mut artifacts = Artifacts::default();
        artifacts.merge(&bag(&[("code", json!("fn main() {}")), ("notes", json!("n1"))]));

        let changed = artifacts.merge(&bag(&[
            ("code", json!("")),
            ("notes", json!(null)),
            ("design_doc", json!("   ")),
            ("extra_key", json!({})),
        ]));

        assert!(changed.is_empty());
        assert_eq!(artifacts.code.as_deref(), Some("fn main() {}"));
        assert_eq!(artifacts.notes.as_deref(), Some("n1"));
        assert!(artifacts.design_doc.is_none());
        assert!(artifacts.extra.is_empty());
    }

    #[test]
    fn test_merge_overwrites_with_new_content() {
        let mut artifacts = Artifacts::default();
        artifacts.merge(&bag(&[("code", json!("v1"))]));
        let changed = artifacts.merge(&bag(&[("code", json!("v2"))]));

        assert_eq!(artifacts.code.as_deref(), Some("v2"));
        assert_eq!(changed, vec!["code"]);
    }

    #[test]
    fn test_merge_stringifies_non_string_known_keys() {
        let mut artifacts = Artifacts::default();
        artifacts.merge(&bag(&[("review_feedback", json!({"approved": true}))]));
        assert_eq!(
            artifacts.review_feedback.as_deref(),
            Some(r#"{"approved":true}"#)
        );
    }

    #[test]
    fn test_handoff_round_trip() {
        let mut handoff = Handoff::new(
            "task-1",
            Role::Architect,
            Role::Implementer,
            Context::new("Build a cache"),
            Artifacts::default(),
        );
        handoff.metadata = Metadata {
            tokens_used: 1234,
            model: "test-model".to_string(),
            duration: Duration::from_millis(250),
        };

        let json = serde_json::to_string(&handoff).unwrap();
        let parsed: Handoff = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.task_id, "task-1");
        assert_eq!(parsed.from_role, Role::Architect);
        assert_eq!(parsed.to_role, Role::Implementer);
        assert_eq!(parsed.context.task_description, "Build a cache");
        assert_eq!(parsed.metadata.tokens_used, 1234);
        assert_eq!(parsed.metadata.duration, Duration::from_millis(250));
    }

    #[test]
    fn test_next_role_serialization() {
        let json = serde_json::to_string(&NextRole::Continue(Role::Reviewer)).unwrap();
        assert_eq!(json, r#"{"continue":"reviewer"}"#);
        let done: NextRole = serde_json::from_str(r#""done""#).unwrap();
        assert!(done.is_done());
    }

    #[test]
    fn test_task_status_parse() {
        assert_eq!("in_progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!(TaskStatus::Failed.to_string(), "failed");
        assert!("bogus".parse::<TaskStatus>().is_err());
    }
}
