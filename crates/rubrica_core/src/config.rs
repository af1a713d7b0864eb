//! Backend selection and storage settings.
//!
//! # Responsibility
//! - Resolve `conf/rubrica.json` beside the executable, else the bundled
//!   default compiled into the binary.
//! - Resolve relative storage paths against the executable directory.
//!
//! # Invariants
//! - A missing, unreadable or malformed configuration file never fails
//!   loading; it falls back to the bundled default (file backend).
//! - Missing relational settings are reported when the backend is built,
//!   not when configuration is loaded.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_RELATIVE_PATH: &str = "conf/rubrica.json";
pub const MEMORY_DB_URL: &str = ":memory:";

const BUNDLED_CONFIG: &str = include_str!("../conf/default.json");
const DEFAULT_FS_BASE_DIR: &str = "contacts";
const DEFAULT_SESSION_TTL_SECS: u64 = 60 * 60;

/// Persistence backend named by the `backend` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Local text files.
    #[default]
    Fs,
    /// SQLite database driven through the contact procedures.
    Dbms,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsSettings {
    /// Root directory for contact files. Relative paths are anchored at the
    /// executable directory.
    pub base_dir: PathBuf,
}

impl Default for FsSettings {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(DEFAULT_FS_BASE_DIR),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbmsSettings {
    /// SQLite database path, or `:memory:`.
    pub url: String,
    /// Lifetime of sessions opened by the command-line gate.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
}

fn default_session_ttl_secs() -> u64 {
    DEFAULT_SESSION_TTL_SECS
}

/// Parsed configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub backend: BackendKind,
    pub fs: FsSettings,
    pub dbms: Option<DbmsSettings>,
}

impl DirectoryConfig {
    /// Parses a JSON configuration document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|source| ConfigError::Parse { path: None, source })
    }

    /// Reads and parses a JSON configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: Some(path.to_path_buf()),
            source,
        })
    }

    /// Configuration compiled into the binary.
    pub fn bundled() -> Self {
        match Self::from_json(BUNDLED_CONFIG) {
            Ok(config) => config,
            Err(err) => {
                warn!("event=config_load module=config status=error source=bundled error={err}");
                Self::default()
            }
        }
    }
}

/// Where the active configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Bundled,
}

/// Configuration together with the directory relative paths resolve against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedConfig {
    pub config: DirectoryConfig,
    pub source: ConfigSource,
    pub anchor_dir: PathBuf,
}

impl LoadedConfig {
    pub fn new(config: DirectoryConfig, anchor_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            source: ConfigSource::Bundled,
            anchor_dir: anchor_dir.into(),
        }
    }

    /// Loads `conf/rubrica.json` under `anchor_dir`, falling back to the
    /// bundled default.
    pub fn load(anchor_dir: impl Into<PathBuf>) -> Self {
        let anchor_dir = anchor_dir.into();
        let candidate = anchor_dir.join(CONFIG_RELATIVE_PATH);
        if !candidate.is_file() {
            info!("event=config_load module=config status=ok source=bundled");
            return Self::new(DirectoryConfig::bundled(), anchor_dir);
        }
        Self::load_file(&candidate, anchor_dir)
    }

    /// Loads an explicit configuration file, falling back to the bundled
    /// default when it cannot be read or parsed.
    pub fn load_file(path: &Path, anchor_dir: impl Into<PathBuf>) -> Self {
        let anchor_dir = anchor_dir.into();
        match DirectoryConfig::from_file(path) {
            Ok(config) => {
                info!(
                    "event=config_load module=config status=ok source=file backend={:?}",
                    config.backend
                );
                Self {
                    config,
                    source: ConfigSource::File(path.to_path_buf()),
                    anchor_dir,
                }
            }
            Err(err) => {
                warn!("event=config_load module=config status=fallback source=bundled error={err}");
                Self::new(DirectoryConfig::bundled(), anchor_dir)
            }
        }
    }

    /// Loads configuration anchored at the running executable's directory.
    pub fn load_beside_executable() -> Self {
        Self::load(executable_dir())
    }

    pub fn backend(&self) -> BackendKind {
        self.config.backend
    }

    /// Absolute root for the file backend.
    pub fn fs_root(&self) -> PathBuf {
        self.resolve(&self.config.fs.base_dir)
    }

    /// Relational settings, required when the backend is `dbms`.
    pub fn dbms(&self) -> Result<&DbmsSettings, ConfigError> {
        match &self.config.dbms {
            Some(settings) if !settings.url.trim().is_empty() => Ok(settings),
            _ => Err(ConfigError::MissingKey("dbms.url")),
        }
    }

    /// SQLite location for the relational backend; `None` means in-memory.
    pub fn dbms_path(&self) -> Result<Option<PathBuf>, ConfigError> {
        let url = self.dbms()?.url.trim();
        if url == MEMORY_DB_URL {
            return Ok(None);
        }
        Ok(Some(self.resolve(Path::new(url))))
    }

    pub fn session_ttl(&self) -> Result<Duration, ConfigError> {
        Ok(Duration::from_secs(self.dbms()?.session_ttl_secs))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.anchor_dir.join(path)
        }
    }
}

/// Directory containing the running executable, else the working directory.
pub fn executable_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: Option<PathBuf>,
        source: serde_json::Error,
    },
    MissingKey(&'static str),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read config `{}`: {source}", path.display())
            }
            Self::Parse {
                path: Some(path),
                source,
            } => write!(f, "invalid config `{}`: {source}", path.display()),
            Self::Parse { path: None, source } => write!(f, "invalid config: {source}"),
            Self::MissingKey(key) => write!(f, "missing config key `{key}`"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::MissingKey(_) => None,
        }
    }
}
