//! Mail source adapter — mailbox size, ordered id listing, raw fetch.
//!
//! The IMAP implementation speaks the protocol directly over rustls. A
//! session is opened on first use and reused across poll cycles; any
//! command failure drops it so the next call reconnects. All blocking
//! socket work runs through `spawn_blocking`.

pub mod extract;

use std::io::Write as IoWrite;
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::MailboxConfig;
use crate::error::MailError;

/// Mailbox access contract (append-only id listing assumed).
#[async_trait]
pub trait MailSource: Send + Sync {
    /// Current number of messages in the mailbox.
    async fn size(&self) -> Result<u64, MailError>;

    /// All message ids in mailbox order.
    async fn list_ids(&self) -> Result<Vec<String>, MailError>;

    /// Raw RFC 822 bytes of one message.
    async fn fetch(&self, id: &str) -> Result<Vec<u8>, MailError>;
}

// ── IMAP implementation ─────────────────────────────────────────────

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

/// One logged-in IMAP connection.
struct ImapSession {
    tls: TlsStream,
    tag_counter: u32,
}

impl ImapSession {
    /// Connect, perform the TLS handshake, and log in.
    fn connect(config: &MailboxConfig) -> Result<Self, MailError> {
        let tcp = TcpStream::connect((&*config.imap_host, config.imap_port))
            .map_err(|e| MailError::Connect(e.to_string()))?;
        tcp.set_read_timeout(Some(Duration::from_secs(30)))
            .map_err(|e| MailError::Connect(e.to_string()))?;

        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth(),
        );
        let server_name: rustls::pki_types::ServerName<'_> =
            rustls::pki_types::ServerName::try_from(config.imap_host.clone())
                .map_err(|e| MailError::Connect(e.to_string()))?;
        let conn = rustls::ClientConnection::new(tls_config, server_name)
            .map_err(|e| MailError::Connect(e.to_string()))?;
        let tls = rustls::StreamOwned::new(conn, tcp);

        let mut session = Self { tls, tag_counter: 0 };

        let _greeting = session.read_line()?;

        let login = session.command(&format!(
            "LOGIN \"{}\" \"{}\"",
            config.username, config.password
        ))?;
        if !login.last().is_some_and(|l| l.contains("OK")) {
            return Err(MailError::Login {
                user: config.username.clone(),
            });
        }

        debug!(host = %config.imap_host, "IMAP session established");
        Ok(session)
    }

    fn read_line(&mut self) -> Result<String, MailError> {
        let mut buf = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            match std::io::Read::read(&mut self.tls, &mut byte) {
                Ok(0) => {
                    return Err(MailError::Connect("IMAP connection closed".into()));
                }
                Ok(_) => {
                    buf.push(byte[0]);
                    if buf.ends_with(b"\r\n") {
                        return Ok(String::from_utf8_lossy(&buf).to_string());
                    }
                }
                Err(e) => return Err(MailError::Connect(e.to_string())),
            }
        }
    }

    /// Send a tagged command and collect response lines up to the tag line.
    fn command(&mut self, cmd: &str) -> Result<Vec<String>, MailError> {
        self.tag_counter += 1;
        let tag = format!("A{}", self.tag_counter);
        let full = format!("{tag} {cmd}\r\n");
        IoWrite::write_all(&mut self.tls, full.as_bytes())
            .map_err(|e| MailError::Connect(e.to_string()))?;
        IoWrite::flush(&mut self.tls).map_err(|e| MailError::Connect(e.to_string()))?;

        let tag_prefix = format!("{tag} ");
        let mut lines = Vec::new();
        loop {
            let line = self.read_line()?;
            let done = line.starts_with(&tag_prefix);
            lines.push(line);
            if done {
                break;
            }
        }
        Ok(lines)
    }

    /// SELECT the mailbox and return its EXISTS count.
    fn select(&mut self, mailbox: &str) -> Result<u64, MailError> {
        let resp = self.command(&format!("SELECT \"{mailbox}\""))?;
        if !resp.last().is_some_and(|l| l.contains("OK")) {
            return Err(MailError::Command {
                command: "SELECT".into(),
                reason: resp.last().cloned().unwrap_or_default(),
            });
        }
        for line in &resp {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 3
                && parts[0] == "*"
                && parts[2] == "EXISTS"
                && let Ok(count) = parts[1].parse::<u64>()
            {
                return Ok(count);
            }
        }
        Err(MailError::Command {
            command: "SELECT".into(),
            reason: "no EXISTS line in response".into(),
        })
    }

    /// SEARCH ALL — ordered sequence numbers of every message.
    fn search_all(&mut self) -> Result<Vec<String>, MailError> {
        let resp = self.command("SEARCH ALL")?;
        let mut ids = Vec::new();
        for line in &resp {
            if line.starts_with("* SEARCH") {
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.len() > 2 {
                    ids.extend(parts[2..].iter().map(|s| s.to_string()));
                }
            }
        }
        Ok(ids)
    }

    /// FETCH one message as raw RFC 822 bytes.
    fn fetch_raw(&mut self, id: &str) -> Result<Vec<u8>, MailError> {
        let resp = self.command(&format!("FETCH {id} RFC822"))?;
        if !resp.last().is_some_and(|l| l.contains("OK")) {
            return Err(MailError::Command {
                command: "FETCH".into(),
                reason: resp.last().cloned().unwrap_or_default(),
            });
        }
        // Everything between the untagged FETCH line and the closing
        // paren/tag line is message payload.
        let raw: String = resp
            .iter()
            .skip(1)
            .take(resp.len().saturating_sub(2))
            .cloned()
            .collect();
        Ok(raw.into_bytes())
    }
}

/// IMAP-backed `MailSource` with a lazily (re)established session.
pub struct ImapMailSource {
    config: MailboxConfig,
    session: Arc<Mutex<Option<ImapSession>>>,
}

impl ImapMailSource {
    pub fn new(config: MailboxConfig) -> Self {
        Self {
            config,
            session: Arc::new(Mutex::new(None)),
        }
    }

    /// Run a closure against the (re)connected session on the blocking pool.
    ///
    /// On command failure the session is discarded so the next call starts
    /// from a fresh connection.
    async fn with_session<T, F>(&self, op: F) -> Result<T, MailError>
    where
        T: Send + 'static,
        F: FnOnce(&mut ImapSession) -> Result<T, MailError> + Send + 'static,
    {
        let config = self.config.clone();
        let slot = Arc::clone(&self.session);

        tokio::task::spawn_blocking(move || {
            let mut guard = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if guard.is_none() {
                *guard = Some(ImapSession::connect(&config)?);
            }
            let session = guard
                .as_mut()
                .ok_or_else(|| MailError::Connect("session unavailable".into()))?;
            match op(session) {
                Ok(value) => Ok(value),
                Err(e) => {
                    warn!(error = %e, "IMAP command failed, dropping session");
                    *guard = None;
                    Err(e)
                }
            }
        })
        .await
        .map_err(|e| MailError::Connect(format!("IMAP task panicked: {e}")))?
    }
}

#[async_trait]
impl MailSource for ImapMailSource {
    async fn size(&self) -> Result<u64, MailError> {
        let mailbox = self.config.mailbox.clone();
        self.with_session(move |s| s.select(&mailbox)).await
    }

    async fn list_ids(&self) -> Result<Vec<String>, MailError> {
        self.with_session(|s| s.search_all()).await
    }

    async fn fetch(&self, id: &str) -> Result<Vec<u8>, MailError> {
        let id = id.to_string();
        self.with_session(move |s| s.fetch_raw(&id)).await
    }
}
