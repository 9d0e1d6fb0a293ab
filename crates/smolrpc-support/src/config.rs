use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// The JSON configuration shape shared by the three services. Only the keys
/// a given role actually reads are required to be present; `listen` is used
/// by server roles, `broker` by the invoker, `data_dir` by the registry.
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub listen: Vec<String>,
    pub broker: Option<String>,
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug)]
pub struct ConfigError(String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError(format!("reading {}: {e}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| ConfigError(format!("parsing {}: {e}", path.display())))
    }

    /// `listen` with a clear error if the config declares no addresses,
    /// rather than the server silently binding nothing.
    pub fn require_listen(&self) -> Result<&[String], ConfigError> {
        if self.listen.is_empty() {
            return Err(ConfigError("config has no \"listen\" addresses".into()));
        }
        Ok(&self.listen)
    }

    pub fn require_broker(&self) -> Result<&str, ConfigError> {
        self.broker
            .as_deref()
            .ok_or_else(|| ConfigError("config has no \"broker\" address".into()))
    }

    pub fn require_data_dir(&self) -> Result<&Path, ConfigError> {
        self.data_dir
            .as_deref()
            .ok_or_else(|| ConfigError("config has no \"data_dir\"".into()))
    }
}
