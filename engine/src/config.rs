use serde::Deserialize;
use std::{env, fs, path::Path, path::PathBuf, time::Duration};
use thiserror::Error;

use confab_types::SessionKey;

use crate::flow::FlowSettings;
use crate::pacer::PacingSettings;

/// Maximum number of channel messages handled per tick.
pub const DEFAULT_EVENT_BUDGET: usize = 512;

const CONFIG_PATH_ENV: &str = "CONFAB_CONFIG";

#[derive(Debug, Default, Deserialize)]
pub struct ConfabConfig {
    pub stream: Option<StreamConfig>,
    pub context: Option<ContextConfig>,
    pub session: Option<SessionConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

/// Stream pacing knobs.
#[derive(Debug, Default, Deserialize)]
pub struct StreamConfig {
    /// Flush tick period in milliseconds. Default: 33.
    pub flush_interval_ms: Option<u64>,
    /// Horizon within which buffered text should be fully revealed. Default: 1000.
    pub drain_target_ms: Option<u64>,
    /// Channel messages processed per tick. Default: 512.
    pub event_budget: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ContextConfig {
    /// Context window of the active api config, in tokens.
    /// Clamped to 16k..=200k; defaults to 128k.
    pub window_tokens: Option<u32>,
}

/// Which api config and agent the chat talks to.
///
/// Values support `${VAR}` environment expansion.
#[derive(Debug, Default, Deserialize)]
pub struct SessionConfig {
    pub api_config_id: Option<String>,
    pub agent_id: Option<String>,
}

pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let Some(end_rel) = rest[start + 2..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let var = &rest[start + 2..start + 2 + end_rel];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &rest[start + 2 + end_rel + 1..];
    }

    out.push_str(rest);
    out
}

impl ConfabConfig {
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    /// Load from an explicit path. A missing file is not an error.
    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    #[must_use]
    pub fn pacing(&self) -> PacingSettings {
        let stream = self.stream.as_ref();
        PacingSettings::new(
            Duration::from_millis(stream.and_then(|s| s.flush_interval_ms).unwrap_or(0)),
            Duration::from_millis(stream.and_then(|s| s.drain_target_ms).unwrap_or(0)),
        )
    }

    #[must_use]
    pub fn event_budget(&self) -> usize {
        self.stream
            .as_ref()
            .and_then(|s| s.event_budget)
            .filter(|budget| *budget > 0)
            .unwrap_or(DEFAULT_EVENT_BUDGET)
    }

    #[must_use]
    pub fn context_window_tokens(&self) -> Option<u32> {
        self.context.as_ref().and_then(|c| c.window_tokens)
    }

    #[must_use]
    pub fn flow_settings(&self) -> FlowSettings {
        FlowSettings {
            pacing: self.pacing(),
            event_budget: self.event_budget(),
            context_window: self.context_window_tokens(),
        }
    }

    /// The configured session, if both ids resolve to non-empty values.
    #[must_use]
    pub fn session(&self) -> Option<SessionKey> {
        let session = self.session.as_ref()?;
        let api_config_id = expand_env_vars(session.api_config_id.as_deref()?);
        let agent_id = expand_env_vars(session.agent_id.as_deref()?);
        match SessionKey::new(api_config_id, agent_id) {
            Ok(key) => Some(key),
            Err(err) => {
                tracing::warn!("Ignoring configured session: {err}");
                None
            }
        }
    }
}

/// `$CONFAB_CONFIG`, else `~/.confab/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".confab").join("config.toml"))
}
