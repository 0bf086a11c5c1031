//! Plan building
//!
//! Turns the declarative `[[phases]]` list into runtime [`Phase`] values.
//! Every problem found here is fatal and is reported before any remote host is
//! contacted.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;

use crate::config::{FlashcopyConfig, PhaseConfig, ProbeConfig};
use crate::external::{
    CommandExecutor, Endpoint, ProcessCommandExecutor, RemoteChannel, SshChannel, SshOptions,
};
use crate::poller::{Phase, PolicyError, Probe, RemoteAction, RetryPolicy};
use crate::probes::{
    DrainDetector, OfflineProbe, ReachabilityProbe, RemoteCommandProbe, TransferQueueProbe,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Configuration file not found: {0}")]
    MissingFile(PathBuf),
    #[error("Plan has no phases")]
    EmptyPlan,
    #[error("Phase #{index} has an empty name")]
    UnnamedPhase { index: usize },
    #[error("Phase `{0}` is declared more than once")]
    DuplicatePhase(String),
    #[error("Phase `{phase}`: {source}")]
    InvalidPolicy {
        phase: String,
        #[source]
        source: PolicyError,
    },
    #[error("Phase `{phase}` refers to unknown host `{host}`")]
    UnknownHost { phase: String, host: String },
    #[error("Jump host `{0}` is not defined under [hosts]")]
    UnknownJumpHost(String),
    #[error("Phase `{phase}` has an empty command")]
    EmptyCommand { phase: String },
    #[error("Phase `{phase}` has an invalid item_pattern: {source}")]
    InvalidPattern {
        phase: String,
        #[source]
        source: regex::Error,
    },
    #[error("Phase `{phase}` drain probe needs empty_markers or an item_pattern")]
    UndetectableDrain { phase: String },
    #[error("Phase `{phase}` drain probe has an empty ok_exit_codes list")]
    NoAcceptedExitCodes { phase: String },
    #[error("Phase `{phase}` clears `{target}`, which is not an earlier phase")]
    UnknownClearedPhase { phase: String, target: String },
}

/// A validated, ready-to-run plan
#[derive(Debug)]
pub struct Plan {
    pub name: String,
    pub phases: Vec<Phase>,
}

/// Check everything that can be checked without touching a host
pub fn validate(config: &FlashcopyConfig) -> Result<(), ConfigError> {
    if config.phases.is_empty() {
        return Err(ConfigError::EmptyPlan);
    }

    if let Some(jump) = &config.ssh.jump_host {
        if !config.hosts.contains_key(jump) {
            return Err(ConfigError::UnknownJumpHost(jump.clone()));
        }
    }

    let mut seen = HashSet::new();
    for (index, phase) in config.phases.iter().enumerate() {
        if phase.name.trim().is_empty() {
            return Err(ConfigError::UnnamedPhase { index });
        }
        if let Some(target) = phase.clears.iter().find(|c| !seen.contains(c.as_str())) {
            return Err(ConfigError::UnknownClearedPhase {
                phase: phase.name.clone(),
                target: target.clone(),
            });
        }
        if !seen.insert(phase.name.as_str()) {
            return Err(ConfigError::DuplicatePhase(phase.name.clone()));
        }
        policy_for(phase)?;
        validate_phase(config, phase)?;
    }
    Ok(())
}

fn policy_for(phase: &PhaseConfig) -> Result<RetryPolicy, ConfigError> {
    RetryPolicy::from_secs(phase.interval_secs, phase.max_attempts).map_err(|source| {
        ConfigError::InvalidPolicy {
            phase: phase.name.clone(),
            source,
        }
    })
}

fn validate_phase(config: &FlashcopyConfig, phase: &PhaseConfig) -> Result<(), ConfigError> {
    let require_host = |host: &str| {
        if config.hosts.contains_key(host) {
            Ok(())
        } else {
            Err(ConfigError::UnknownHost {
                phase: phase.name.clone(),
                host: host.to_string(),
            })
        }
    };
    let require_command = |command: &str| {
        if command.trim().is_empty() {
            Err(ConfigError::EmptyCommand {
                phase: phase.name.clone(),
            })
        } else {
            Ok(())
        }
    };

    if let Some(action) = &phase.action {
        require_host(&action.host)?;
        require_command(&action.command)?;
    }

    require_host(phase.probe.host())?;
    match &phase.probe {
        ProbeConfig::Command { command, .. } | ProbeConfig::Offline { command, .. } => {
            require_command(command)?;
        }
        ProbeConfig::Drain {
            command,
            empty_markers,
            item_pattern,
            ok_exit_codes,
            ..
        } => {
            require_command(command)?;
            if empty_markers.is_empty() && item_pattern.is_none() {
                return Err(ConfigError::UndetectableDrain {
                    phase: phase.name.clone(),
                });
            }
            if ok_exit_codes.is_empty() {
                return Err(ConfigError::NoAcceptedExitCodes {
                    phase: phase.name.clone(),
                });
            }
            compile_pattern(phase, item_pattern.as_deref())?;
        }
        ProbeConfig::Reachable { .. } | ProbeConfig::Unreachable { .. } => {}
    }
    Ok(())
}

fn compile_pattern(phase: &PhaseConfig, pattern: Option<&str>) -> Result<Option<Regex>, ConfigError> {
    pattern
        .map(|p| {
            Regex::new(p).map_err(|source| ConfigError::InvalidPattern {
                phase: phase.name.clone(),
                source,
            })
        })
        .transpose()
}

/// Builds probes and channels for one plan, sharing one channel per host
pub struct PlanBuilder<'a> {
    config: &'a FlashcopyConfig,
    executor: Arc<dyn CommandExecutor>,
    channels: HashMap<String, Arc<dyn RemoteChannel>>,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(config: &'a FlashcopyConfig) -> Self {
        let timeout = Duration::from_secs(config.ssh.command_timeout_secs.max(1));
        Self::with_executor(config, Arc::new(ProcessCommandExecutor::with_timeout(timeout)))
    }

    pub fn with_executor(config: &'a FlashcopyConfig, executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            config,
            executor,
            channels: HashMap::new(),
        }
    }

    pub fn build(mut self) -> Result<Plan, ConfigError> {
        let config = self.config;
        validate(config)?;

        let mut phases = Vec::with_capacity(config.phases.len());
        for phase_config in &config.phases {
            phases.push(self.build_phase(phase_config)?);
        }

        Ok(Plan {
            name: config.run.plan.clone(),
            phases,
        })
    }

    /// Build the probe of a single named phase
    pub fn build_probe_for(mut self, name: &str) -> Option<Result<Arc<dyn Probe>, ConfigError>> {
        let config = self.config;
        let phase = config.phases.iter().find(|p| p.name == name)?;
        Some(validate_phase(config, phase).and_then(|()| self.build_probe(phase)))
    }

    fn build_phase(&mut self, config: &PhaseConfig) -> Result<Phase, ConfigError> {
        let mut phase = Phase::new(config.name.clone(), self.build_probe(config)?, policy_for(config)?)
            .with_mode(config.mode);

        if let Some(action) = &config.action {
            let channel = self.channel(&config.name, &action.host)?;
            phase = phase.with_action(RemoteAction::new(action.command.clone(), channel));
        }
        if let Some(note) = &config.on_failure {
            phase = phase.with_on_failure(note.clone());
        }
        if let Some(note) = &config.leaves {
            phase = phase.leaving(note.clone());
        }
        if !config.clears.is_empty() {
            phase = phase.clearing(config.clears.iter().cloned());
        }
        Ok(phase)
    }

    fn build_probe(&mut self, config: &PhaseConfig) -> Result<Arc<dyn Probe>, ConfigError> {
        let probe: Arc<dyn Probe> = match &config.probe {
            ProbeConfig::Reachable { host, timeout_secs } => {
                Arc::new(self.ping(&config.name, host, *timeout_secs)?)
            }
            ProbeConfig::Unreachable { host, timeout_secs } => {
                let ping = self.ping(&config.name, host, *timeout_secs)?;
                Arc::new(OfflineProbe::new(Arc::new(ping)))
            }
            ProbeConfig::Command {
                host,
                command,
                expect,
            } => {
                let mut probe = RemoteCommandProbe::new(self.channel(&config.name, host)?, command.clone());
                if let Some(text) = expect {
                    probe = probe.expecting(text.clone());
                }
                Arc::new(probe)
            }
            ProbeConfig::Offline { host, command } => {
                let login = RemoteCommandProbe::new(self.channel(&config.name, host)?, command.clone());
                Arc::new(OfflineProbe::new(Arc::new(login)).transport_means_offline(true))
            }
            ProbeConfig::Drain {
                host,
                command,
                empty_markers,
                item_pattern,
                ok_exit_codes,
            } => {
                let pattern = compile_pattern(config, item_pattern.as_deref())?;
                let detector = DrainDetector::new(empty_markers.clone(), pattern);
                Arc::new(
                    TransferQueueProbe::new(self.channel(&config.name, host)?, command.clone(), detector)
                        .with_ok_exit_codes(ok_exit_codes.clone()),
                )
            }
        };
        Ok(probe)
    }

    fn ping(&self, phase: &str, host: &str, timeout_secs: Option<u64>) -> Result<ReachabilityProbe, ConfigError> {
        let endpoint = self.endpoint(phase, host)?;
        let mut probe = ReachabilityProbe::new(self.executor.clone(), endpoint.address);
        if let Some(secs) = timeout_secs {
            probe = probe.with_timeout_secs(secs);
        }
        Ok(probe)
    }

    fn endpoint(&self, phase: &str, host: &str) -> Result<Endpoint, ConfigError> {
        let host_config = self.config.hosts.get(host).ok_or_else(|| ConfigError::UnknownHost {
            phase: phase.to_string(),
            host: host.to_string(),
        })?;

        let mut endpoint = Endpoint::new(host_config.address.clone());
        if let Some(user) = &host_config.user {
            endpoint = endpoint.with_user(user.clone());
        }
        if let Some(port) = host_config.port {
            endpoint = endpoint.with_port(port);
        }
        Ok(endpoint)
    }

    fn channel(&mut self, phase: &str, host: &str) -> Result<Arc<dyn RemoteChannel>, ConfigError> {
        if let Some(channel) = self.channels.get(host) {
            return Ok(channel.clone());
        }

        let config = self.config;
        let ssh = &config.ssh;
        let options = SshOptions {
            connect_timeout_secs: ssh.connect_timeout_secs,
            identity_file: ssh.identity_file.clone(),
            batch_mode: true,
        };
        let mut channel = SshChannel::new(self.executor.clone(), self.endpoint(phase, host)?)
            .with_options(options);
        if let Some(jump) = &ssh.jump_host {
            let jump_endpoint = self
                .endpoint(phase, jump)
                .map_err(|_| ConfigError::UnknownJumpHost(jump.clone()))?;
            channel = channel.via(jump_endpoint, ssh.hop);
        }

        let channel: Arc<dyn RemoteChannel> = Arc::new(channel);
        self.channels.insert(host.to_string(), channel.clone());
        Ok(channel)
    }
}
