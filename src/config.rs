use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AssistError, Result};
use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::operation::GenerationParams;

pub const DEFAULT_API_URL: &str = "https://solcoder.remixproject.org";
pub const DEFAULT_COMPLETION_URL: &str = "https://completion.remixproject.org";
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 60;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistConfig {
    /// Which backend serves inference. Chosen once at startup.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Generation params for the operations whose callers supply none
    /// (generation, completion, insertion).
    #[serde(default)]
    pub params: GenerationParams,

    /// Question/answer pairs remembered for follow-up questions. Default: 7.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}
fn default_remote_timeout() -> u64 {
    DEFAULT_REMOTE_TIMEOUT_SECS
}
fn default_companion_timeout() -> u64 {
    300
}
fn default_api_url() -> String {
    DEFAULT_API_URL.into()
}
fn default_completion_url() -> String {
    DEFAULT_COMPLETION_URL.into()
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            params: GenerationParams::default(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl AssistConfig {
    /// Load config from a YAML file. Returns default if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents).map_err(|reason| AssistError::ConfigParse {
            path: path.to_path_buf(),
            reason,
        })
    }

    fn parse(contents: &str) -> std::result::Result<Self, String> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(contents).map_err(|e| e.to_string())
    }

    /// Resolve the effective config. An explicit path wins; otherwise
    /// `.assist-relay/config.yml` under `project_root`, then the global file.
    pub fn load(explicit: Option<&Path>, project_root: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(AssistError::ConfigParse {
                    path: path.to_path_buf(),
                    reason: "file not found".into(),
                });
            }
            return Self::load_from(path);
        }

        let project = project_root.join(".assist-relay").join("config.yml");
        if project.exists() {
            return Self::load_from(&project);
        }

        Self::load_from(&dirs_global().join("config.yml"))
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| AssistError::ConfigParse {
            path: PathBuf::from("<memory>"),
            reason: e.to_string(),
        })
    }
}

/// Backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Network inference endpoint.
    Remote {
        #[serde(default = "default_api_url")]
        api_url: String,
        #[serde(default = "default_completion_url")]
        completion_url: String,
        #[serde(default = "default_remote_timeout")]
        timeout_secs: u64,
    },
    /// Local companion process reached over a Unix socket.
    Companion {
        socket_path: Option<PathBuf>,
        #[serde(default = "default_companion_timeout")]
        timeout_secs: u64,
        /// Tell the companion to proxy to its own remote endpoint instead of local models.
        #[serde(default)]
        use_remote: bool,
        general_model: Option<String>,
        completion_model: Option<String>,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::Remote {
            api_url: default_api_url(),
            completion_url: default_completion_url(),
            timeout_secs: default_remote_timeout(),
        }
    }
}

/// Returns the global config directory path: `~/.config/assist-relay/`
pub fn dirs_global() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(home).join(".config").join("assist-relay")
}

/// Default companion socket. Prefers XDG_RUNTIME_DIR, falls back to /tmp.
pub fn default_socket_path() -> PathBuf {
    std::env::var("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
        .join("assist-relay-companion.sock")
}
