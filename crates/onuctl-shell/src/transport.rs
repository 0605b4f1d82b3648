// SSH transport for OLT shells.
//
// Opens a password-authenticated SSH connection, requests a PTY and an
// interactive shell, and exposes the channel through the `Shell` trait.
// OLTs in the field present self-generated host keys, so every key is
// accepted; the target is identified by address and credentials.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client;
use russh::{Channel, ChannelMsg, Disconnect};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::error::Error;
use crate::session::{Connector, Shell};

/// Bounded number of reads spent discarding the login banner.
const BANNER_DRAIN_READS: usize = 16;

/// Shared transport tuning for every SSH session a connector opens.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    pub inactivity_timeout: Option<Duration>,
    /// Pause after the shell opens before the banner is discarded.
    pub banner_settle: Duration,
    pub terminal_cols: u32,
    pub terminal_rows: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            inactivity_timeout: Some(Duration::from_secs(600)),
            banner_settle: Duration::from_millis(500),
            terminal_cols: 200,
            terminal_rows: 48,
        }
    }
}

impl TransportConfig {
    /// Build the `russh` client configuration from this config.
    pub fn build_client_config(&self) -> Arc<client::Config> {
        Arc::new(client::Config {
            inactivity_timeout: self.inactivity_timeout,
            ..Default::default()
        })
    }
}

/// Address and credentials of one OLT.
#[derive(Debug, Clone)]
pub struct SshTarget {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
}

impl SshTarget {
    /// `host:port` label used in logs and errors.
    pub fn label(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Opens SSH shells against a single target.
pub struct SshConnector {
    target: SshTarget,
    transport: TransportConfig,
    client_config: Arc<client::Config>,
}

impl SshConnector {
    pub fn new(target: SshTarget, transport: TransportConfig) -> Self {
        let client_config = transport.build_client_config();
        Self {
            target,
            transport,
            client_config,
        }
    }

    pub fn target(&self) -> &SshTarget {
        &self.target
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn open(&self) -> Result<Box<dyn Shell>, Error> {
        let label = self.target.label();
        let addr = (self.target.host.as_str(), self.target.port);

        let mut handle = tokio::time::timeout(
            self.transport.connect_timeout,
            client::connect(Arc::clone(&self.client_config), addr, AcceptAnyHostKey),
        )
        .await
        .map_err(|_| Error::Timeout {
            target: label.clone(),
            timeout_secs: self.transport.connect_timeout.as_secs(),
        })?
        .map_err(|e| Error::Connect {
            target: label.clone(),
            reason: e.to_string(),
        })?;

        let auth = handle
            .authenticate_password(
                self.target.username.as_str(),
                self.target.password.expose_secret(),
            )
            .await?;
        if !auth.success() {
            return Err(Error::Authentication {
                target: label,
                username: self.target.username.clone(),
            });
        }

        let channel = handle.channel_open_session().await?;
        channel
            .request_pty(
                false,
                "vt100",
                self.transport.terminal_cols,
                self.transport.terminal_rows,
                0,
                0,
                &[],
            )
            .await?;
        channel.request_shell(false).await?;

        let mut shell = SshShell { handle, channel };

        tokio::time::sleep(self.transport.banner_settle).await;
        for _ in 0..BANNER_DRAIN_READS {
            if shell.recv(Duration::from_millis(50)).await?.is_none() {
                break;
            }
        }

        debug!(target = %label, "shell channel open");
        Ok(Box::new(shell))
    }

    fn label(&self) -> String {
        self.target.label()
    }
}

// ── Host key policy ─────────────────────────────────────────────────

struct AcceptAnyHostKey;

impl client::Handler for AcceptAnyHostKey {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh::keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

// ── Shell channel ───────────────────────────────────────────────────

struct SshShell {
    handle: client::Handle<AcceptAnyHostKey>,
    channel: Channel<client::Msg>,
}

#[async_trait]
impl Shell for SshShell {
    async fn write(&mut self, data: &[u8]) -> Result<(), Error> {
        self.channel.data(data).await?;
        Ok(())
    }

    async fn recv(&mut self, wait: Duration) -> Result<Option<String>, Error> {
        let Ok(msg) = tokio::time::timeout(wait, self.channel.wait()).await else {
            return Ok(None);
        };

        match msg {
            Some(ChannelMsg::Data { data } | ChannelMsg::ExtendedData { data, .. }) => {
                Ok(Some(String::from_utf8_lossy(&data).into_owned()))
            }
            Some(ChannelMsg::Eof | ChannelMsg::Close) | None => Err(Error::ChannelClosed),
            Some(_) => Ok(None),
        }
    }

    async fn close(&mut self) {
        let _ = self.channel.eof().await;
        let _ = self.channel.close().await;
        let _ = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await;
    }
}
