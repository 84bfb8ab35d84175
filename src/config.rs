use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::session::SessionConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IntentionConfig {
    /// OpenAI-compatible chat-completions URL. Unset means offline fallbacks only.
    pub endpoint: Option<String>,
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for IntentionConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: "gpt-4o-mini".to_string(),
            api_key_env: "MINDBELL_API_KEY".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub duration_minutes: i64,
    pub reminder_count: i64,
    pub random_spacing: bool,
    pub chime: bool,
    pub keep_awake: bool,
    pub intention: IntentionConfig,
}

impl Default for Config {
    fn default() -> Self {
        let session = SessionConfig::default();
        Self {
            duration_minutes: i64::from(session.duration_minutes),
            reminder_count: i64::from(session.reminder_count),
            random_spacing: session.is_random,
            chime: true,
            keep_awake: true,
            intention: IntentionConfig::default(),
        }
    }
}

impl Config {
    /// Session settings with every value clamped into range
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::clamped(
            self.duration_minutes,
            self.reminder_count,
            self.random_spacing,
        )
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
    fn path(&self) -> &Path;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "mindbell") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("mindbell_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        match fs::read(&self.path) {
            Ok(bytes) => match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => cfg,
                Err(err) => {
                    tracing::warn!(path = %self.path.display(), error = %err, "ignoring invalid config");
                    Config::default()
                }
            },
            Err(_) => Config::default(),
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }

    fn path(&self) -> &Path {
        &self.path
    }
}
