//! IMAP-over-TLS gateway (inbound) + SMTP via lettre (outbound).
//!
//! Blocking socket work runs under `spawn_blocking`; sockets carry a read
//! timeout so one unreachable host cannot stall the poller indefinitely.
//!
//! Fetching never flags messages — `mark_seen` is a separate, batched
//! operation so the orchestrator controls exactly which messages get their
//! read-state advanced, and when.

use std::io::Write as IoWrite;
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use mail_parser::{MessageParser, MimeHeaders};
use uuid::Uuid;

use crate::config::MailboxConfig;
use crate::error::{ConfigError, MailboxError};
use crate::mailbox::{MailMessage, Mailbox, strip_html};

/// Socket read timeout for IMAP sessions.
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Production mailbox gateway: IMAP for list/fetch/flag, SMTP for send.
pub struct ImapMailbox {
    config: MailboxConfig,
}

impl ImapMailbox {
    /// Build a gateway. Fails fast on missing credentials so the process
    /// can degrade to API-only mode instead of failing on the first poll.
    pub fn new(config: MailboxConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }
}

#[async_trait]
impl Mailbox for ImapMailbox {
    async fn list_candidates(
        &self,
        unread_only: bool,
        limit: usize,
    ) -> Result<Vec<MailMessage>, MailboxError> {
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || fetch_messages(&config, unread_only, limit))
            .await
            .map_err(|e| MailboxError::Protocol(format!("fetch task panicked: {e}")))?
    }

    async fn mark_seen(&self, ids: &[String]) -> Result<(), MailboxError> {
        if ids.is_empty() {
            return Ok(());
        }
        let config = self.config.clone();
        let ids = ids.to_vec();
        tokio::task::spawn_blocking(move || store_seen(&config, &ids))
            .await
            .map_err(|e| MailboxError::Protocol(format!("mark-seen task panicked: {e}")))?
    }

    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), MailboxError> {
        let config = self.config.clone();
        let recipient = recipient.to_string();
        let subject = subject.to_string();
        let body = body.to_string();
        tokio::task::spawn_blocking(move || smtp_send(&config, &recipient, &subject, &body))
            .await
            .map_err(|e| MailboxError::Protocol(format!("send task panicked: {e}")))?
    }
}

// ── IMAP session ────────────────────────────────────────────────────

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

/// A logged-in IMAP session with INBOX selected.
struct ImapSession {
    tls: TlsStream,
    tag_counter: u32,
}

impl ImapSession {
    /// Connect, log in, and select INBOX.
    fn open(config: &MailboxConfig) -> Result<Self, MailboxError> {
        let tcp = TcpStream::connect((&*config.imap_host, config.imap_port)).map_err(|e| {
            MailboxError::Connect {
                host: config.imap_host.clone(),
                reason: e.to_string(),
            }
        })?;
        tcp.set_read_timeout(Some(READ_TIMEOUT))?;

        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth(),
        );
        let server_name: rustls::pki_types::ServerName<'_> =
            rustls::pki_types::ServerName::try_from(config.imap_host.clone())
                .map_err(|e| MailboxError::Protocol(format!("invalid server name: {e}")))?;
        let conn = rustls::ClientConnection::new(tls_config, server_name)
            .map_err(|e| MailboxError::Protocol(format!("TLS setup failed: {e}")))?;
        let tls = rustls::StreamOwned::new(conn, tcp);

        let mut session = Self { tls, tag_counter: 0 };

        // Server greeting
        session.read_line()?;

        let login = session.command(&format!(
            "LOGIN \"{}\" \"{}\"",
            config.username, config.password
        ))?;
        if !login.last().is_some_and(|l| l.contains("OK")) {
            return Err(MailboxError::Auth {
                user: config.username.clone(),
            });
        }

        session.command("SELECT \"INBOX\"")?;
        Ok(session)
    }

    fn read_line(&mut self) -> Result<String, MailboxError> {
        let mut buf = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            match std::io::Read::read(&mut self.tls, &mut byte) {
                Ok(0) => {
                    return Err(MailboxError::Protocol("connection closed".to_string()));
                }
                Ok(_) => {
                    buf.push(byte[0]);
                    if buf.ends_with(b"\r\n") {
                        return Ok(String::from_utf8_lossy(&buf).to_string());
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Send a tagged command and collect response lines up to the tagged
    /// completion line.
    fn command(&mut self, cmd: &str) -> Result<Vec<String>, MailboxError> {
        self.tag_counter += 1;
        let tag = format!("A{}", self.tag_counter);
        let full = format!("{tag} {cmd}\r\n");
        IoWrite::write_all(&mut self.tls, full.as_bytes())?;
        IoWrite::flush(&mut self.tls)?;

        let mut lines = Vec::new();
        loop {
            let line = self.read_line()?;
            let done = line.starts_with(&tag);
            lines.push(line);
            if done {
                break;
            }
        }
        Ok(lines)
    }

    fn logout(&mut self) {
        let _ = self.command("LOGOUT");
    }
}

// ── Blocking operations ─────────────────────────────────────────────

/// Fetch candidate messages, newest first. Does NOT alter read-state.
fn fetch_messages(
    config: &MailboxConfig,
    unread_only: bool,
    limit: usize,
) -> Result<Vec<MailMessage>, MailboxError> {
    let mut session = ImapSession::open(config)?;

    let criteria = if unread_only { "UNSEEN" } else { "ALL" };
    let search = session.command(&format!("UID SEARCH {criteria}"))?;

    let mut uids: Vec<String> = Vec::new();
    for line in &search {
        if line.starts_with("* SEARCH") {
            uids.extend(
                line.split_whitespace()
                    .skip(2)
                    .map(|s| s.trim().to_string()),
            );
        }
    }

    // Search returns ascending UIDs; newest first, capped at `limit`.
    uids.reverse();
    uids.truncate(limit);

    let mut results = Vec::new();
    for uid in &uids {
        let fetch = match session.command(&format!("UID FETCH {uid} (RFC822 FLAGS)")) {
            Ok(lines) => lines,
            Err(e) => {
                // One unfetchable message must not abort the whole listing.
                tracing::warn!(uid = %uid, error = %e, "Fetch failed, skipping message");
                continue;
            }
        };

        let joined = fetch.join("");
        let unread = !joined.contains("\\Seen");

        let raw: String = fetch
            .iter()
            .skip(1)
            .take(fetch.len().saturating_sub(2))
            .cloned()
            .collect();

        if let Some(parsed) = MessageParser::default().parse(raw.as_bytes()) {
            results.push(MailMessage {
                id: uid.clone(),
                sender: extract_sender(&parsed),
                subject: parsed.subject().unwrap_or("(no subject)").to_string(),
                body: extract_text(&parsed),
                unread,
            });
        } else {
            tracing::warn!(uid = %uid, "Unparseable message, skipping");
        }
    }

    session.logout();
    Ok(results)
}

/// Flag a batch of UIDs as \Seen over a single session. Idempotent.
fn store_seen(config: &MailboxConfig, ids: &[String]) -> Result<(), MailboxError> {
    let mut session = ImapSession::open(config)?;
    for uid in ids {
        if let Err(e) = session.command(&format!("UID STORE {uid} +FLAGS (\\Seen)")) {
            tracing::warn!(uid = %uid, error = %e, "Failed to mark message seen");
        }
    }
    session.logout();
    Ok(())
}

/// Send a message via an SMTP STARTTLS relay.
fn smtp_send(
    config: &MailboxConfig,
    recipient: &str,
    subject: &str,
    body: &str,
) -> Result<(), MailboxError> {
    let send_failed = |reason: String| MailboxError::SendFailed {
        recipient: recipient.to_string(),
        reason,
    };

    let creds = Credentials::new(config.username.clone(), config.password.clone());

    let transport = SmtpTransport::starttls_relay(&config.smtp_host)
        .map_err(|e| send_failed(format!("SMTP relay error: {e}")))?
        .port(config.smtp_port)
        .credentials(creds)
        .build();

    let email = Message::builder()
        .from(
            config
                .from_address
                .parse()
                .map_err(|e| send_failed(format!("invalid from address: {e}")))?,
        )
        .to(recipient
            .parse()
            .map_err(|e| send_failed(format!("invalid recipient address: {e}")))?)
        .subject(subject)
        .body(body.to_string())
        .map_err(|e| send_failed(format!("failed to build message: {e}")))?;

    transport
        .send(&email)
        .map_err(|e| send_failed(format!("SMTP send failed: {e}")))?;

    tracing::info!(recipient = %recipient, "Email sent");
    Ok(())
}

// ── MIME extraction helpers ─────────────────────────────────────────

/// Extract the bare sender address from a parsed email.
fn extract_sender(parsed: &mail_parser::Message) -> String {
    parsed
        .from()
        .and_then(|addr| addr.first())
        .and_then(|a| a.address())
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("unknown-{}", Uuid::new_v4()))
}

/// Extract readable text: text/plain preferred, HTML stripped as fallback.
fn extract_text(parsed: &mail_parser::Message) -> String {
    if let Some(text) = parsed.body_text(0) {
        return text.trim().to_string();
    }
    if let Some(html) = parsed.body_html(0) {
        return strip_html(html.as_ref());
    }
    for part in parsed.attachments() {
        let part: &mail_parser::MessagePart = part;
        if let Some(ct) = MimeHeaders::content_type(part)
            && ct.ctype() == "text"
            && let Ok(text) = std::str::from_utf8(part.contents())
        {
            return text.trim().to_string();
        }
    }
    String::new()
}
