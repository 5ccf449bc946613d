//! Mailbox gateway — capability interface over the mail transport.
//!
//! The orchestrator and the HTTP surface only ever see this trait; the IMAP
//! and SMTP mechanics live in [`imap`].

pub mod imap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MailboxError;

pub use imap::ImapMailbox;

/// A candidate message fetched from the mailbox.
///
/// Transient — produced fresh by the gateway each list call, never mutated,
/// discarded after the cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailMessage {
    /// Mailbox-assigned UID or protocol Message-ID. Stable for the lifetime
    /// of the mailbox; the dedup ledger is keyed on it.
    pub id: String,
    /// Raw address-like sender string. Not structurally validated.
    pub sender: String,
    pub subject: String,
    pub body: String,
    /// Read-state at fetch time.
    pub unread: bool,
}

/// Capability interface to the mail transport.
///
/// Implemented by [`ImapMailbox`] in production and by in-memory fakes in
/// tests. All methods may block on the network internally but must not hold
/// the caller beyond a bounded timeout.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// List candidate messages, newest first, up to `limit`.
    async fn list_candidates(
        &self,
        unread_only: bool,
        limit: usize,
    ) -> Result<Vec<MailMessage>, MailboxError>;

    /// Mark a batch of messages as seen. Idempotent — already-seen ids are
    /// not an error.
    async fn mark_seen(&self, ids: &[String]) -> Result<(), MailboxError>;

    /// Send a message through the outbound transport.
    async fn send(&self, recipient: &str, subject: &str, body: &str)
    -> Result<(), MailboxError>;
}

/// Strip HTML tags from content (basic) and normalize whitespace.
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_html_basic() {
        assert_eq!(strip_html("<p>Hello</p>"), "Hello");
    }

    #[test]
    fn strip_html_nested_tags() {
        assert_eq!(
            strip_html("<div><b>Bold</b> and <i>italic</i></div>"),
            "Bold and italic"
        );
    }

    #[test]
    fn strip_html_whitespace_normalized() {
        assert_eq!(strip_html("<p>  Hello   World  </p>"), "Hello World");
    }

    #[test]
    fn strip_html_plain_text_passthrough() {
        assert_eq!(strip_html("No HTML here"), "No HTML here");
    }

    #[test]
    fn mail_message_serde_uses_plain_field_names() {
        let msg = MailMessage {
            id: "42".into(),
            sender: "alice@example.com".into(),
            subject: "Hi".into(),
            body: "Hello".into(),
            unread: true,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["id"], "42");
        assert_eq!(json["unread"], true);
    }
}
