//! Configuration loading
//!
//! Settings are layered. Command-line flags win over environment variables,
//! which win over `.coop.toml`. The engine never reads any of this directly;
//! it receives a resolved [`WorkflowConfig`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use orchestrator::{Role, WorkflowConfig, DEFAULT_MAX_REVIEW_CYCLES};
use serde::Deserialize;

/// Name of the project config file
pub const CONFIG_FILE: &str = ".coop.toml";

pub const ENV_MAX_REVIEW_CYCLES: &str = "MAX_REVIEW_CYCLES";
pub const ENV_DATA_DIR: &str = "COOPERATIONS_DIR";
pub const ENV_GENERATED_DIR: &str = "COOPERATIONS_GENERATED_DIR";

/// Database file inside the data directory
pub const DATABASE_FILE: &str = "cooperations.db";

/// Default agent command timeout (seconds)
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Find a config file by walking up the directory tree, then checking global config.
///
/// Search order:
/// 1. Current directory and parent directories (walking up to root)
/// 2. Global config at ~/.config/cooperations/
fn find_config_file(filename: &str) -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let candidate = current.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_path = config_dir.join("cooperations").join(filename);
        if global_path.exists() {
            return Some(global_path);
        }
    }

    None
}

// ============================================================================
// File configuration (.coop.toml)
// ============================================================================

/// Top-level file configuration
#[derive(Debug, Default, Deserialize)]
pub struct CoopFileConfig {
    #[serde(default)]
    pub workflow: WorkflowSection,
    #[serde(default)]
    pub storage: StorageSection,
    /// Command used for every role unless overridden
    #[serde(default)]
    pub agent: AgentSection,
    /// Per-role overrides, keyed by role name
    #[serde(default)]
    pub agents: HashMap<String, AgentOverride>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WorkflowSection {
    pub max_review_cycles: Option<u32>,
    #[serde(default)]
    pub step_through: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct StorageSection {
    /// Data directory (holds the database)
    pub dir: Option<String>,
    /// Where generated artifacts are written
    pub generated_dir: Option<String>,
}

/// External model command settings
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSection {
    #[serde(default = "default_command")]
    pub command: String,
    /// Arguments; a `{prompt}` entry is replaced by the prompt, otherwise
    /// the prompt is written to stdin
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    pub model: Option<String>,
}

fn default_command() -> String {
    "claude".to_string()
}

fn default_args() -> Vec<String> {
    vec!["--print".to_string()]
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: default_args(),
            timeout_secs: default_timeout_secs(),
            model: None,
        }
    }
}

/// Per-role override; unset fields fall back to `[agent]`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentOverride {
    pub command: Option<String>,
    pub args: Option<Vec<String>>,
    pub timeout_secs: Option<u64>,
    pub model: Option<String>,
    /// Replaces the built-in system prompt for this role
    pub system_prompt: Option<String>,
}

impl CoopFileConfig {
    /// Load config from .coop.toml
    ///
    /// Falls back to defaults when no file is found.
    pub fn load() -> Result<Self> {
        if let Some(config_path) = find_config_file(CONFIG_FILE) {
            tracing::debug!("Loading config from: {}", config_path.display());
            return Self::load_from_path(&config_path);
        }

        tracing::debug!("No {} found, using defaults", CONFIG_FILE);
        Ok(Self::default())
    }

    /// Load from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: CoopFileConfig = toml::from_str(&content)
            .with_context(|| format!("Invalid config file {:?}", path))?;
        Ok(config)
    }
}

// ============================================================================
// Resolved settings
// ============================================================================

/// Fully resolved command for one role
#[derive(Debug, Clone, PartialEq)]
pub struct AgentCommand {
    pub command: String,
    pub args: Vec<String>,
    pub timeout: Duration,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
}

/// Settings after file and environment layers are applied
#[derive(Debug, Clone)]
pub struct Settings {
    pub max_review_cycles: u32,
    pub step_through: bool,
    pub data_dir: PathBuf,
    pub generated_dir: PathBuf,
    agents: HashMap<Role, AgentCommand>,
}

impl Settings {
    /// Load the config file and apply the process environment
    pub fn load() -> Result<Self> {
        let file = CoopFileConfig::load()?;
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    /// Apply an environment lookup on top of file values
    pub fn resolve(file: CoopFileConfig, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let max_review_cycles = match env(ENV_MAX_REVIEW_CYCLES) {
            Some(raw) => raw.trim().parse::<u32>().with_context(|| {
                format!("{} must be a non-negative integer, got {:?}", ENV_MAX_REVIEW_CYCLES, raw)
            })?,
            None => file
                .workflow
                .max_review_cycles
                .unwrap_or(DEFAULT_MAX_REVIEW_CYCLES),
        };

        let data_dir = match env(ENV_DATA_DIR).or(file.storage.dir) {
            Some(dir) => expand_path(&dir),
            None => default_data_dir()?,
        };

        let generated_dir = match env(ENV_GENERATED_DIR).or(file.storage.generated_dir) {
            Some(dir) => expand_path(&dir),
            None => data_dir.join("generated"),
        };

        let mut overrides = HashMap::new();
        for (name, value) in file.agents {
            let role: Role = name
                .parse()
                .with_context(|| format!("Unknown role in [agents.{}]", name))?;
            if role == Role::Human {
                bail!("[agents.human] is not configurable; the human role is the operator");
            }
            overrides.insert(role, value);
        }

        let agents = Role::ALL
            .into_iter()
            .filter(|role| *role != Role::Human)
            .map(|role| {
                let over = overrides.remove(&role).unwrap_or_default();
                let command = AgentCommand {
                    command: over.command.unwrap_or_else(|| file.agent.command.clone()),
                    args: over.args.unwrap_or_else(|| file.agent.args.clone()),
                    timeout: Duration::from_secs(
                        over.timeout_secs.unwrap_or(file.agent.timeout_secs),
                    ),
                    model: over.model.or_else(|| file.agent.model.clone()),
                    system_prompt: over.system_prompt,
                };
                (role, command)
            })
            .collect();

        Ok(Self {
            max_review_cycles,
            step_through: file.workflow.step_through,
            data_dir,
            generated_dir,
            agents,
        })
    }

    /// SQLite database location
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    /// Command settings for an AI role
    pub fn agent(&self, role: Role) -> Option<&AgentCommand> {
        self.agents.get(&role)
    }

    /// Engine configuration
    pub fn workflow_config(&self) -> WorkflowConfig {
        WorkflowConfig::default()
            .with_max_review_cycles(self.max_review_cycles)
            .with_step_through(self.step_through)
    }
}

fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

fn default_data_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".cooperations"))
}
