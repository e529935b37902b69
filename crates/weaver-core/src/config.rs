//! Configuration for the worker pool, submissions, interpreter limits and dispatch.

use core::time::Duration;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Complete engine configuration.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker pool configuration
    pub pool: PoolConfig,
    /// Submission protocol configuration
    pub submission: SubmissionConfig,
    /// Limits applied to every worker's interpreter
    pub interpreter: InterpreterLimits,
    /// Dispatcher configuration
    pub dispatch: DispatchConfig,
}

/// Worker pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of live workers, and of concurrent blocking offloads
    pub capacity: usize,
    /// How long to wait for a new worker's ready handshake
    pub startup_timeout_ms: u64,
    /// How long a worker process may take to exit after shutdown before it is killed
    pub shutdown_grace_ms: u64,
    /// Worker executable; located next to the running binary when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_program: Option<PathBuf>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: 5,
            startup_timeout_ms: 10_000,
            shutdown_grace_ms: 2_000,
            worker_program: None,
        }
    }
}

impl PoolConfig {
    /// Startup handshake timeout
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    /// Shutdown grace period
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Submission protocol configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionConfig {
    /// Aggregate deadline of one submission
    pub timeout_secs: u64,
    /// Upper bound of a single poll of the worker's event stream
    pub poll_interval_ms: u64,
    /// Canonicalize source before submitting it
    pub auto_format: bool,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            poll_interval_ms: 250,
            auto_format: true,
        }
    }
}

impl SubmissionConfig {
    /// Aggregate submission deadline
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Per-poll wait bound
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Limits applied to a worker's interpreter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterLimits {
    /// Maximum iterations of any single loop; unlimited when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loop_iteration_limit: Option<u64>,
    /// Maximum call recursion depth
    pub recursion_limit: usize,
}

impl Default for InterpreterLimits {
    fn default() -> Self {
        Self {
            loop_iteration_limit: None,
            recursion_limit: 512,
        }
    }
}

/// Worker allocation policy for code tools.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerPolicy {
    /// Start a fresh worker for every code task and stop it afterwards
    #[default]
    FreshPerTask,
    /// Reuse the named worker for every code task; the caller owns its lifetime
    Pinned(String),
}

/// Dispatcher configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Worker allocation policy
    pub worker_policy: WorkerPolicy,
}

impl EngineConfig {
    /// Get the default config directory path (`~/.weaver`)
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_owned()))?;
        Ok(home.join(".weaver"))
    }

    /// Get the default config file path (`~/.weaver/config.toml`)
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load config from `path` if given, else from the default location,
    /// falling back to defaults when no file exists
    ///
    /// # Errors
    /// Returns an error if an existing file cannot be read or parsed
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(explicit) => explicit.to_path_buf(),
            None => match Self::config_path() {
                Ok(default_path) => default_path,
                Err(_) => return Ok(Self::default()),
            },
        };

        if path.exists() {
            Self::load_from_file(&path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load config from a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if it is invalid
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|error| Error::Config(format!("Failed to read config: {error}")))?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;

        tracing::debug!(
            "Loaded config from {}: capacity={}, timeout={}s",
            path.display(),
            config.pool.capacity,
            config.submission.timeout_secs
        );

        Ok(config)
    }

    /// Save config to a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be written
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|error| {
                Error::Config(format!("Failed to create config directory: {error}"))
            })?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|error| Error::Config(format!("Failed to serialize config: {error}")))?;

        let header = "# Weaver Configuration File\n\
                      # Edit this file to customize pool, submission and dispatch settings\n\n";

        fs::write(path, format!("{header}{contents}"))
            .map_err(|error| Error::Config(format!("Failed to write config: {error}")))?;

        Ok(())
    }

    /// Reject values the engine cannot run with
    ///
    /// # Errors
    /// Returns an error naming the first invalid setting
    pub fn validate(&self) -> Result<()> {
        if self.pool.capacity == 0 {
            return Err(Error::Config("pool.capacity must be at least 1".to_owned()));
        }
        if self.submission.poll_interval_ms == 0 {
            return Err(Error::Config(
                "submission.poll_interval_ms must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.pool.capacity, 5);
        assert_eq!(config.submission.timeout(), Duration::from_secs(30));
        assert!(config.submission.auto_format);
        assert_eq!(config.dispatch.worker_policy, WorkerPolicy::FreshPerTask);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let mut file = NamedTempFile::new().expect("create temp file");
        write!(
            file,
            r#"
[pool]
capacity = 2

[dispatch]
worker_policy = {{ pinned = "shared01" }}
"#
        )
        .expect("write config");

        let config = EngineConfig::load_from_file(file.path()).expect("load config");
        assert_eq!(config.pool.capacity, 2);
        assert_eq!(config.pool.shutdown_grace_ms, 2_000);
        assert_eq!(config.pool.worker_program, None);
        assert_eq!(config.submission.poll_interval_ms, 250);
        assert_eq!(
            config.dispatch.worker_policy,
            WorkerPolicy::Pinned("shared01".to_owned())
        );
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut file = NamedTempFile::new().expect("create temp file");
        write!(file, "[pool]\ncapacity = 0\n").expect("write config");

        let error = EngineConfig::load_from_file(file.path()).unwrap_err();
        assert!(matches!(error, Error::Config(_)));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("nested").join("config.toml");

        let mut config = EngineConfig::default();
        config.submission.auto_format = false;
        config.save_to_file(&path).expect("save config");

        let loaded = EngineConfig::load_from_file(&path).expect("reload config");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_explicit_path_uses_defaults() {
        let dir = TempDir::new().expect("create temp dir");
        let config = EngineConfig::load_or_default(Some(&dir.path().join("absent.toml")))
            .expect("defaults");
        assert_eq!(config, EngineConfig::default());
    }
}
