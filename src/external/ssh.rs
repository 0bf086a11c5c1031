//! Double-hop SSH channel
//!
//! Every remote check and action reaches the target LPAR through a jump host.
//! The channel only knows how to build the `ssh` invocation; what runs on the
//! other side is an opaque command string.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::command::{CommandError, CommandExecutor, CommandOutput};

/// Exit status `ssh` uses for its own failures (refused, auth, DNS)
pub const SSH_TRANSPORT_EXIT: i32 = 255;

/// Executes an opaque command on a remote host
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteChannel: Send + Sync {
    /// Run `command` remotely. `Err` means the command never reached the host.
    async fn run(&self, command: &str) -> Result<CommandOutput, CommandError>;

    /// Human-readable target, used in logs
    fn target(&self) -> String;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub address: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

impl Endpoint {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            user: None,
            port: None,
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// `user@address`, or just `address`
    pub fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{user}@{}", self.address),
            None => self.address.clone(),
        }
    }

    /// ProxyJump form, `user@address:port`
    fn jump_spec(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{port}", self.destination()),
            None => self.destination(),
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.jump_spec())
    }
}

/// How the jump host is traversed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HopStyle {
    /// `ssh -J jump target -- cmd`
    #[default]
    ProxyJump,
    /// `ssh jump ssh target 'cmd'`, for jump hosts that forbid forwarding
    Nested,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshOptions {
    pub connect_timeout_secs: u64,
    pub identity_file: Option<PathBuf>,
    pub batch_mode: bool,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 15,
            identity_file: None,
            batch_mode: true,
        }
    }
}

impl SshOptions {
    fn args(&self) -> Vec<String> {
        let mut args = self.hop_args();
        if let Some(identity) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }
        args
    }

    /// Options for the `ssh` started on the jump host. The identity file is
    /// a local path, so it is left out there.
    fn hop_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.batch_mode {
            args.push("-o".to_string());
            args.push("BatchMode=yes".to_string());
        }
        args.push("-o".to_string());
        args.push(format!("ConnectTimeout={}", self.connect_timeout_secs));
        args
    }
}

pub struct SshChannel {
    executor: Arc<dyn CommandExecutor>,
    program: String,
    jump: Option<Endpoint>,
    target: Endpoint,
    hop: HopStyle,
    options: SshOptions,
}

impl SshChannel {
    pub fn new(executor: Arc<dyn CommandExecutor>, target: Endpoint) -> Self {
        Self {
            executor,
            program: "ssh".to_string(),
            jump: None,
            target,
            hop: HopStyle::default(),
            options: SshOptions::default(),
        }
    }

    pub fn via(mut self, jump: Endpoint, hop: HopStyle) -> Self {
        self.jump = Some(jump);
        self.hop = hop;
        self
    }

    pub fn with_options(mut self, options: SshOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn port_args(endpoint: &Endpoint) -> Vec<String> {
        endpoint
            .port
            .map(|port| vec!["-p".to_string(), port.to_string()])
            .unwrap_or_default()
    }

    /// Full argv passed to the local `ssh` binary
    pub fn build_args(&self, command: &str) -> Result<Vec<String>, CommandError> {
        let mut args = self.options.args();

        match (&self.jump, self.hop) {
            (None, _) => {
                args.extend(Self::port_args(&self.target));
                args.push(self.target.destination());
                args.push("--".to_string());
                args.push(command.to_string());
            }
            (Some(jump), HopStyle::ProxyJump) => {
                args.push("-J".to_string());
                args.push(jump.jump_spec());
                args.extend(Self::port_args(&self.target));
                args.push(self.target.destination());
                args.push("--".to_string());
                args.push(command.to_string());
            }
            (Some(jump), HopStyle::Nested) => {
                args.extend(Self::port_args(jump));
                args.push(jump.destination());

                // Everything after the jump destination is re-parsed by the
                // jump host's shell, so each inner word is quoted once.
                let mut inner = vec![self.program.clone()];
                inner.extend(self.options.hop_args());
                inner.extend(Self::port_args(&self.target));
                inner.push(self.target.destination());
                inner.push(command.to_string());

                for word in &inner {
                    let quoted = shlex::try_quote(word).map_err(|e| CommandError::ExecutionFailed {
                        message: format!("cannot quote remote command: {e}"),
                    })?;
                    args.push(quoted.into_owned());
                }
            }
        }

        Ok(args)
    }
}

#[async_trait]
impl RemoteChannel for SshChannel {
    async fn run(&self, command: &str) -> Result<CommandOutput, CommandError> {
        let args = self.build_args(command)?;
        debug!(target = %self.target(), command = %command, "Running remote command");

        let output = self.executor.execute(&self.program, &args).await?;
        if output.status_code == SSH_TRANSPORT_EXIT {
            return Err(CommandError::Transport {
                target: self.target(),
                message: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }

    fn target(&self) -> String {
        match &self.jump {
            Some(jump) => format!("{} via {}", self.target, jump),
            None => self.target.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingExecutor {
        calls: Mutex<Vec<(String, Vec<String>)>>,
        status_code: i32,
    }

    #[async_trait]
    impl CommandExecutor for RecordingExecutor {
        async fn execute(&self, program: &str, args: &[String]) -> Result<CommandOutput, CommandError> {
            self.calls.lock().unwrap().push((program.to_string(), args.to_vec()));
            Ok(CommandOutput {
                status_code: self.status_code,
                stdout: String::new(),
                stderr: if self.status_code == SSH_TRANSPORT_EXIT {
                    "ssh: connect to host 10.0.0.5 port 22: Connection refused\n".to_string()
                } else {
                    String::new()
                },
            })
        }
    }

    fn channel(hop: HopStyle) -> SshChannel {
        SshChannel::new(
            Arc::new(RecordingExecutor::default()),
            Endpoint::new("clone.lpar").with_user("qsecofr"),
        )
        .via(Endpoint::new("jump.example").with_user("ops").with_port(2222), hop)
    }

    #[test]
    fn test_proxy_jump_args() {
        let args = channel(HopStyle::ProxyJump)
            .build_args("system \"WRKMEDBRM TYPE(*TRF)\"")
            .unwrap();

        assert_eq!(
            args,
            vec![
                "-o", "BatchMode=yes",
                "-o", "ConnectTimeout=15",
                "-J", "ops@jump.example:2222",
                "qsecofr@clone.lpar",
                "--",
                "system \"WRKMEDBRM TYPE(*TRF)\"",
            ]
        );
    }

    #[test]
    fn test_nested_hop_quotes_inner_command() {
        let args = channel(HopStyle::Nested)
            .build_args("echo 'ready'")
            .unwrap();

        assert_eq!(&args[4..7], &["-p", "2222", "ops@jump.example"]);
        assert_eq!(
            shlex::split(&args[7..].join(" ")),
            Some(vec![
                "ssh".to_string(),
                "-o".to_string(),
                "BatchMode=yes".to_string(),
                "-o".to_string(),
                "ConnectTimeout=15".to_string(),
                "qsecofr@clone.lpar".to_string(),
                "echo 'ready'".to_string(),
            ])
        );
    }

    #[test]
    fn test_nested_hop_keeps_identity_file_local() {
        let options = SshOptions {
            identity_file: Some(PathBuf::from("/home/ops/my keys/ibmi_ed25519")),
            ..SshOptions::default()
        };
        let args = channel(HopStyle::Nested)
            .with_options(options)
            .build_args("true")
            .unwrap();

        let jump_at = args.iter().position(|a| a == "ops@jump.example").unwrap();
        assert_eq!(
            &args[..jump_at],
            &[
                "-o", "BatchMode=yes",
                "-o", "ConnectTimeout=15",
                "-i", "/home/ops/my keys/ibmi_ed25519",
                "-p", "2222",
            ]
        );

        let inner = shlex::split(&args[jump_at + 1..].join(" ")).unwrap();
        assert!(!inner.iter().any(|w| w == "-i" || w.contains("my keys")));
        assert_eq!(inner.last().map(String::as_str), Some("true"));
    }

    #[test]
    fn test_identity_file_is_passed() {
        let options = SshOptions {
            identity_file: Some(PathBuf::from("/home/ops/.ssh/ibmi_ed25519")),
            ..SshOptions::default()
        };
        let channel = SshChannel::new(
            Arc::new(RecordingExecutor::default()),
            Endpoint::new("source.lpar"),
        )
        .with_options(options);

        let args = channel.build_args("true").unwrap();
        assert!(args.windows(2).any(|w| w == ["-i", "/home/ops/.ssh/ibmi_ed25519"]));
        assert_eq!(&args[args.len() - 3..], &["source.lpar", "--", "true"]);
    }

    #[tokio::test]
    async fn test_exit_255_is_transport_error() {
        let executor = Arc::new(RecordingExecutor {
            status_code: SSH_TRANSPORT_EXIT,
            ..Default::default()
        });
        let channel = SshChannel::new(executor.clone(), Endpoint::new("clone.lpar"));

        let err = channel.run("true").await.unwrap_err();

        assert!(matches!(err, CommandError::Transport { ref message, .. } if message.contains("Connection refused")));
        assert_eq!(executor.calls.lock().unwrap()[0].0, "ssh");
    }

    #[tokio::test]
    async fn test_remote_nonzero_exit_is_returned() {
        let executor = Arc::new(RecordingExecutor {
            status_code: 1,
            ..Default::default()
        });
        let channel = SshChannel::new(executor, Endpoint::new("clone.lpar"));

        let output = channel.run("false").await.unwrap();
        assert_eq!(output.status_code, 1);
        assert_eq!(channel.target(), "clone.lpar");
    }
}
