use crate::error::Result;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Contents of `bolt.yaml`. Every key is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the change-management (release) API.
    #[serde(default)]
    pub xlr_url: String,
    /// Base URL of the automation-inventory API.
    #[serde(default)]
    pub tower_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub accept_invalid_certs: bool,
    /// Entries kept in the SPK inventory cache. `0` disables caching.
    #[serde(default = "default_cache_capacity")]
    pub inventory_cache_capacity: usize,
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
    /// Upper bound on pages followed for a paginated list endpoint.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    /// Seconds a server session stays valid after login.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    /// Live server sessions kept; the oldest is evicted past this.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_cache_capacity() -> usize {
    32
}

fn default_export_dir() -> PathBuf {
    PathBuf::from(paths::DEFAULT_EXPORT_DIR)
}

fn default_max_pages() -> usize {
    20
}

fn default_session_ttl_secs() -> u64 {
    8 * 60 * 60
}

fn default_max_sessions() -> usize {
    256
}

impl Default for Config {
    fn default() -> Self {
        Self {
            xlr_url: String::new(),
            tower_url: String::new(),
            timeout_secs: default_timeout_secs(),
            accept_invalid_certs: false,
            inventory_cache_capacity: default_cache_capacity(),
            export_dir: default_export_dir(),
            max_pages: default_max_pages(),
            session_ttl_secs: default_session_ttl_secs(),
            max_sessions: default_max_sessions(),
        }
    }
}

impl Config {
    /// Load `bolt.yaml` from `root`. A missing file yields the defaults.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(&data)?;
        Ok(config)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&paths::config_path(root), data.as_bytes())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn export_dir(&self, root: &Path) -> PathBuf {
        paths::resolve_under(root, &self.export_dir)
    }

    /// Check the config for mistakes that would only surface mid-run.
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        for (key, url) in [("xlr_url", &self.xlr_url), ("tower_url", &self.tower_url)] {
            if url.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "{key} is not set; it must be supplied on the command line or at login"
                    ),
                });
            } else if !(url.starts_with("http://") || url.starts_with("https://")) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("{key} '{url}' must start with http:// or https://"),
                });
            }
        }

        if self.timeout_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "timeout_secs must be greater than zero".to_string(),
            });
        }

        for (key, value) in [
            ("max_pages", self.max_pages as u64),
            ("session_ttl_secs", self.session_ttl_secs),
            ("max_sessions", self.max_sessions as u64),
        ] {
            if value == 0 {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("{key} must be greater than zero"),
                });
            }
        }

        if self.accept_invalid_certs {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "accept_invalid_certs is enabled; TLS certificates are not verified"
                    .to_string(),
            });
        }

        warnings
    }
}
