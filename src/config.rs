use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::external::HopStyle;
use crate::plan::ConfigError;
use crate::poller::PhaseMode;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "flashcopy-runner.toml";

/// Main configuration structure for the FlashCopy runner
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FlashcopyConfig {
    /// Run-wide settings
    pub run: RunConfig,
    /// SSH transport settings
    pub ssh: SshConfig,
    /// Named hosts (clone LPAR, source LPAR, jump host)
    pub hosts: BTreeMap<String, HostConfig>,
    /// Observability settings
    pub observability: ObservabilityConfig,
    /// Ordered phase list
    pub phases: Vec<PhaseConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RunConfig {
    /// Plan name shown in logs and summaries
    pub plan: String,
    /// Exclusive lock held for the duration of a run
    pub lock_file: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            plan: "flashcopy-backup".to_string(),
            lock_file: ".flashcopy-runner/run.lock".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SshConfig {
    /// Name of the host entry used as jump host (none means direct)
    pub jump_host: Option<String>,
    /// How the jump host is traversed
    pub hop: HopStyle,
    /// `ConnectTimeout` passed to ssh
    pub connect_timeout_secs: u64,
    /// Upper bound for any single remote command
    pub command_timeout_secs: u64,
    /// Private key used for both hops
    pub identity_file: Option<PathBuf>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            jump_host: None,
            hop: HopStyle::ProxyJump,
            connect_timeout_secs: 15,
            command_timeout_secs: 600, // 10 minutes
            identity_file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HostConfig {
    pub address: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level used when RUST_LOG is not set
    pub log_level: String,
    /// Emit JSON log lines instead of compact text
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PhaseConfig {
    pub name: String,
    pub interval_secs: u64,
    pub max_attempts: u32,
    #[serde(default)]
    pub mode: PhaseMode,
    /// Remote command issued once before the first probe
    #[serde(default)]
    pub action: Option<ActionConfig>,
    pub probe: ProbeConfig,
    /// Manual correction to suggest when this phase fails
    #[serde(default)]
    pub on_failure: Option<String>,
    /// Remote state this phase leaves until a later phase undoes it
    #[serde(default)]
    pub leaves: Option<String>,
    /// Earlier phases whose `leaves` state this phase undoes
    #[serde(default)]
    pub clears: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ActionConfig {
    pub host: String,
    pub command: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeConfig {
    /// Host answers ping
    Reachable {
        host: String,
        #[serde(default)]
        timeout_secs: Option<u64>,
    },
    /// Host stopped answering ping
    Unreachable {
        host: String,
        #[serde(default)]
        timeout_secs: Option<u64>,
    },
    /// Remote command exits 0 (and prints `expect`, if given)
    Command {
        host: String,
        command: String,
        #[serde(default)]
        expect: Option<String>,
    },
    /// SSH to the host no longer succeeds
    Offline {
        host: String,
        #[serde(default = "default_offline_command")]
        command: String,
    },
    /// Transfer queue listing reports nothing outstanding
    Drain {
        host: String,
        command: String,
        #[serde(default)]
        empty_markers: Vec<String>,
        #[serde(default)]
        item_pattern: Option<String>,
        /// Exit statuses that still count as a successful listing
        #[serde(default = "default_ok_exit_codes")]
        ok_exit_codes: Vec<i32>,
    },
}

fn default_offline_command() -> String {
    "true".to_string()
}

fn default_ok_exit_codes() -> Vec<i32> {
    vec![0]
}

impl ProbeConfig {
    pub fn host(&self) -> &str {
        match self {
            ProbeConfig::Reachable { host, .. }
            | ProbeConfig::Unreachable { host, .. }
            | ProbeConfig::Command { host, .. }
            | ProbeConfig::Offline { host, .. }
            | ProbeConfig::Drain { host, .. } => host,
        }
    }
}

impl FlashcopyConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (`path`, or flashcopy-runner.toml if present)
    /// 3. Environment variables (prefixed with FLASHCOPY_, `__` between keys)
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&FlashcopyConfig::default())?);

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::MissingFile(path.to_path_buf()));
                }
                builder = builder.add_source(File::from(path));
            }
            None => {
                if Path::new(DEFAULT_CONFIG_FILE).exists() {
                    builder = builder.add_source(File::with_name(DEFAULT_CONFIG_FILE));
                }
            }
        }

        // Override with environment variables
        builder = builder.add_source(
            Environment::with_prefix("FLASHCOPY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> anyhow::Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}
