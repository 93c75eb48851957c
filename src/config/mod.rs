pub mod paths;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Which extensions the validator loads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Built-in extensions to offer; `None` offers all of them.
    pub extensions: Option<Vec<String>>,
    /// Additional extension resources.
    pub custom_extensions: Vec<PathBuf>,
}

impl ValidatorConfig {
    /// Reads the config file from the platform config directory.
    pub fn load() -> Self {
        match paths::config_dir() {
            Some(dir) => Self::load_from(&dir),
            None => Self::default(),
        }
    }

    /// Reads `config.json` from `dir`. A missing file yields the defaults;
    /// an unreadable or malformed one is reported and ignored.
    pub fn load_from(dir: &Path) -> Self {
        match Self::try_load_from(dir) {
            Ok(Some(config)) => config,
            Ok(None) => Self::default(),
            Err(e @ ConfigError::Io { .. }) => {
                warn!(error = %e, "ignoring unreadable config");
                Self::default()
            }
            Err(e @ ConfigError::Json { .. }) => {
                warn!(error = %e, "ignoring malformed config");
                Self::default()
            }
        }
    }

    /// Like [`load_from`](Self::load_from), but only a missing file is
    /// silent: it gives `Ok(None)`.
    pub fn try_load_from(dir: &Path) -> Result<Option<Self>, ConfigError> {
        let path = dir.join(paths::CONFIG_FILE);
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(ConfigError::Io { path, source }),
        };
        let mut config: Self = match serde_json::from_str(&data) {
            Ok(config) => config,
            Err(source) => return Err(ConfigError::Json { path, source }),
        };
        debug!(path = %path.display(), "loaded config");
        config.resolve_paths(dir);
        Ok(Some(config))
    }

    fn resolve_paths(&mut self, base: &Path) {
        for path in &mut self.custom_extensions {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    /// Command-line values win: a non-empty allow list replaces the
    /// configured one, custom resources are added.
    pub fn apply_overrides(&mut self, extensions: Vec<String>, custom: Vec<PathBuf>) {
        if !extensions.is_empty() {
            self.extensions = Some(extensions);
        }
        self.custom_extensions.extend(custom);
    }
}
