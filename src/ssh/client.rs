// ABOUTME: SSH session management using russh.
// ABOUTME: Connects, authenticates, runs commands and opens long-lived exec channels.

use super::error::{Error, Result};
use super::quote;
use russh::client::{self, Config, Handle, Msg};
use russh::keys::agent::client::AgentClient;
use russh::keys::known_hosts::{
    check_known_hosts, check_known_hosts_path, learn_known_hosts, learn_known_hosts_path,
};
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key, ssh_key};
use russh::{Channel, ChannelMsg, Disconnect};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::UnixStream;

/// A channel running a single remote command.
pub type ExecChannel = Channel<Msg>;

fn default_port() -> u16 {
    22
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(300)
}

/// Where and how to reach a remote host.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionConfig {
    /// Remote host to connect to.
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    /// Private key file. When absent the SSH agent is tried, then the
    /// default key locations under `~/.ssh`.
    #[serde(default)]
    pub key_path: Option<PathBuf>,
    /// Accept and remember unknown host keys.
    #[serde(default)]
    pub trust_on_first_use: bool,
    /// Defaults to `~/.ssh/known_hosts`.
    #[serde(default)]
    pub known_hosts_path: Option<PathBuf>,
    /// Timeout for short housekeeping commands (directory creation, kill).
    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    pub command_timeout: Duration,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            user: user.into(),
            key_path: None,
            trust_on_first_use: false,
            known_hosts_path: None,
            command_timeout: default_command_timeout(),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    pub fn trust_on_first_use(mut self, tofu: bool) -> Self {
        self.trust_on_first_use = tofu;
        self
    }

    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// `user@host:port`, used in logs and error messages.
    pub fn target(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.port)
    }
}

/// Output from a remote command run to completion.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: u32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Host key verification against known_hosts.
pub(crate) struct SshHandler {
    host: String,
    port: u16,
    trust_on_first_use: bool,
    known_hosts_path: Option<PathBuf>,
}

impl SshHandler {
    fn learn(&self, key: &ssh_key::PublicKey) {
        let learned = match &self.known_hosts_path {
            Some(path) => learn_known_hosts_path(&self.host, self.port, key, path),
            None => learn_known_hosts(&self.host, self.port, key),
        };
        if let Err(e) = learned {
            tracing::warn!(host = %self.host, error = %e, "Failed to save host key to known_hosts");
        }
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let known = match &self.known_hosts_path {
            Some(path) => check_known_hosts_path(&self.host, self.port, server_public_key, path),
            None => check_known_hosts(&self.host, self.port, server_public_key),
        };

        match known {
            Ok(true) => Ok(true),
            Err(russh::keys::Error::KeyChanged { .. }) => {
                tracing::error!(host = %self.host, port = self.port, "Host key changed, refusing connection");
                Ok(false)
            }
            Ok(false) | Err(_) if self.trust_on_first_use => {
                tracing::warn!(host = %self.host, port = self.port, "Trust-On-First-Use: accepting unknown host key");
                self.learn(server_public_key);
                Ok(true)
            }
            Ok(false) | Err(_) => Ok(false),
        }
    }
}

enum AuthMethod {
    Agent(AgentClient<UnixStream>),
    KeyFile(Arc<ssh_key::PrivateKey>),
}

/// An established, authenticated SSH session.
pub struct Session {
    config: SessionConfig,
    handle: Handle<SshHandler>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("handle", &"<russh::Handle>")
            .finish()
    }
}

impl Session {
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        let auth_method = resolve_auth_method(&config).await?;

        let russh_config = Config {
            inactivity_timeout: None,
            keepalive_interval: Some(Duration::from_secs(15)),
            ..Default::default()
        };

        let handler = SshHandler {
            host: config.host.clone(),
            port: config.port,
            trust_on_first_use: config.trust_on_first_use,
            known_hosts_path: config.known_hosts_path.clone(),
        };

        let mut handle = client::connect(Arc::new(russh_config), (config.host.as_str(), config.port), handler)
            .await
            .map_err(|e| Error::Connection(format!("{}: {e}", config.target())))?;

        if !authenticate(&mut handle, &config, auth_method).await? {
            return Err(Error::AuthenticationFailed);
        }

        tracing::debug!(remote = %config.target(), "SSH session established");
        Ok(Self { config, handle })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Run a command to completion with the configured command timeout.
    pub async fn exec(&self, command: &str) -> Result<CommandOutput> {
        self.exec_with_timeout(command, self.config.command_timeout).await
    }

    pub async fn exec_with_timeout(&self, command: &str, timeout: Duration) -> Result<CommandOutput> {
        match tokio::time::timeout(timeout, self.exec_inner(command)).await {
            Ok(result) => result,
            Err(_) => Err(Error::CommandTimeout(timeout)),
        }
    }

    /// Run a command and fail unless it exits with status zero.
    pub async fn exec_checked(&self, command: &str) -> Result<CommandOutput> {
        let output = self.exec(command).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(Error::NonZeroExit {
                command: command.to_string(),
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }

    /// Start a command and hand back its channel for streaming.
    pub async fn open_exec(&self, command: &str) -> Result<ExecChannel> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| Error::ChannelOpen(e.to_string()))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to exec command: {e}")))?;

        Ok(channel)
    }

    async fn exec_inner(&self, command: &str) -> Result<CommandOutput> {
        let channel = self.open_exec(command).await?;
        collect_output(channel).await
    }

    /// `mkdir -p` the given remote path.
    pub async fn make_directories(&self, path: &str) -> Result<()> {
        self.exec_checked(&format!("mkdir -p {}", quote(path))).await.map(|_| ())
    }

    /// Stream a local file to `destination` on the remote host.
    pub async fn upload(&self, source: &Path, destination: &str) -> Result<()> {
        let upload_failed = |reason: String| Error::Upload {
            path: source.to_path_buf(),
            reason,
        };

        let mut file = tokio::fs::File::open(source).await?;
        let channel = self.open_exec(&format!("cat > {}", quote(destination))).await?;

        let mut buf = vec![0u8; 65536];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            channel
                .data(&buf[..n])
                .await
                .map_err(|e| upload_failed(e.to_string()))?;
        }
        channel.eof().await.map_err(|e| upload_failed(e.to_string()))?;

        let output = collect_output(channel).await?;
        if !output.success() {
            return Err(upload_failed(format!(
                "remote cat exited with status {}: {}",
                output.exit_code,
                output.stderr.trim()
            )));
        }

        tracing::debug!(source = %source.display(), destination, "Uploaded file");
        Ok(())
    }

    pub async fn disconnect(self) -> Result<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(Error::Protocol)
    }
}

/// Drain a channel until it reports both EOF and an exit status.
async fn collect_output(mut channel: ExecChannel) -> Result<CommandOutput> {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut exit_code = None;
    let mut got_eof = false;

    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { data } => stdout.extend_from_slice(&data),
            ChannelMsg::ExtendedData { data, ext: 1 } => stderr.extend_from_slice(&data),
            ChannelMsg::ExitStatus { exit_status } => {
                exit_code = Some(exit_status);
                if got_eof {
                    break;
                }
            }
            ChannelMsg::Eof => {
                got_eof = true;
                if exit_code.is_some() {
                    break;
                }
            }
            ChannelMsg::Close => break,
            _ => {}
        }
    }

    let exit_code = exit_code.ok_or(Error::ChannelClosed)?;
    Ok(CommandOutput {
        exit_code,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    })
}

async fn resolve_auth_method(config: &SessionConfig) -> Result<AuthMethod> {
    if let Some(key_path) = &config.key_path {
        let key = load_secret_key(key_path, None).map_err(|e| Error::KeyLoadFailed {
            path: key_path.clone(),
            reason: e.to_string(),
        })?;
        return Ok(AuthMethod::KeyFile(Arc::new(key)));
    }

    if let Ok(agent) = AgentClient::connect_env().await {
        return Ok(AuthMethod::Agent(agent));
    }

    let home = std::env::var("HOME")
        .map_err(|_| Error::AgentUnavailable("SSH agent not available and HOME not set".to_string()))?;

    ["id_ed25519", "id_rsa", "id_ecdsa"]
        .iter()
        .find_map(|name| load_secret_key(format!("{home}/.ssh/{name}"), None).ok())
        .map(|key| AuthMethod::KeyFile(Arc::new(key)))
        .ok_or_else(|| Error::AgentUnavailable("SSH agent not available and no default keys found".to_string()))
}

async fn authenticate(handle: &mut Handle<SshHandler>, config: &SessionConfig, auth_method: AuthMethod) -> Result<bool> {
    match auth_method {
        AuthMethod::Agent(mut agent) => {
            let keys = agent
                .request_identities()
                .await
                .map_err(|e| Error::AgentUnavailable(format!("failed to list agent keys: {e}")))?;

            if keys.is_empty() {
                return Err(Error::AgentUnavailable("no keys in SSH agent".to_string()));
            }

            for key in keys {
                if let Ok(result) = handle
                    .authenticate_publickey_with(&config.user, key, None, &mut agent)
                    .await
                    && result.success()
                {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        AuthMethod::KeyFile(key) => {
            let hash_alg = handle.best_supported_rsa_hash().await?.flatten();
            let result = handle
                .authenticate_publickey(&config.user, PrivateKeyWithHashAlg::new(key, hash_alg))
                .await?;
            Ok(result.success())
        }
    }
}
