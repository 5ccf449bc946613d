//! Reply dispatch — send-or-queue decision plus outbox recording.
//!
//! Every invocation writes exactly one outbox row, whatever the outcome.
//! A failed transmission is data (a `send_error:` status), not an error
//! propagated to the cycle loop.

use std::sync::Arc;

use crate::error::StoreError;
use crate::mailbox::Mailbox;
use crate::store::Store;

/// Outcome of a dispatch: the outbox row id and its status tag.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DispatchOutcome {
    pub message_id: i64,
    pub status: String,
}

/// Decides whether a composed reply is transmitted or queued, and records
/// the attempt.
pub struct Dispatcher {
    mailbox: Option<Arc<dyn Mailbox>>,
    store: Arc<dyn Store>,
    /// When false, auto mode rehearses: nothing is transmitted and the
    /// attempt is recorded as `queued(simulated)`.
    live_send: bool,
}

impl Dispatcher {
    pub fn new(mailbox: Option<Arc<dyn Mailbox>>, store: Arc<dyn Store>, live_send: bool) -> Self {
        Self {
            mailbox,
            store,
            live_send,
        }
    }

    /// Dispatch a reply. `auto` false → queued without any transport call;
    /// `auto` true → transmit (or simulate) and record the outcome.
    ///
    /// Errors only if the outbox insert itself fails.
    pub async fn dispatch(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
        auto: bool,
    ) -> Result<DispatchOutcome, StoreError> {
        let status = if !auto {
            "queued".to_string()
        } else if !self.live_send {
            "queued(simulated)".to_string()
        } else {
            match &self.mailbox {
                Some(mailbox) => match mailbox.send(recipient, subject, body).await {
                    Ok(()) => "sent(smtp)".to_string(),
                    Err(e) => {
                        tracing::warn!(recipient = %recipient, error = %e, "Send failed");
                        format!("send_error:{e}")
                    }
                },
                None => "send_error:mailbox unavailable".to_string(),
            }
        };

        let outbox_id = self
            .store
            .insert_outbox(recipient, subject, body, &status, auto)
            .await?;

        tracing::info!(
            outbox_id,
            recipient = %recipient,
            status = %status,
            auto,
            "Reply dispatched"
        );

        Ok(DispatchOutcome {
            message_id: outbox_id,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::MailboxError;
    use crate::mailbox::MailMessage;
    use crate::store::LibSqlStore;

    /// Mailbox that records sends and can be told to fail them.
    struct MockMailbox {
        sends: Mutex<Vec<(String, String, String)>>,
        fail_sends: bool,
    }

    impl MockMailbox {
        fn new(fail_sends: bool) -> Self {
            Self {
                sends: Mutex::new(Vec::new()),
                fail_sends,
            }
        }

        fn send_count(&self) -> usize {
            self.sends.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Mailbox for MockMailbox {
        async fn list_candidates(
            &self,
            _unread_only: bool,
            _limit: usize,
        ) -> Result<Vec<MailMessage>, MailboxError> {
            Ok(Vec::new())
        }

        async fn mark_seen(&self, _ids: &[String]) -> Result<(), MailboxError> {
            Ok(())
        }

        async fn send(
            &self,
            recipient: &str,
            subject: &str,
            body: &str,
        ) -> Result<(), MailboxError> {
            if self.fail_sends {
                return Err(MailboxError::SendFailed {
                    recipient: recipient.to_string(),
                    reason: "smtp rejected".to_string(),
                });
            }
            self.sends.lock().unwrap().push((
                recipient.to_string(),
                subject.to_string(),
                body.to_string(),
            ));
            Ok(())
        }
    }

    async fn store() -> Arc<dyn Store> {
        Arc::new(LibSqlStore::new_memory().await.unwrap())
    }

    #[tokio::test]
    async fn manual_dispatch_queues_without_transport_call() {
        let store = store().await;
        let mailbox = Arc::new(MockMailbox::new(false));
        let dispatcher = Dispatcher::new(Some(mailbox.clone()), Arc::clone(&store), true);

        let outcome = dispatcher
            .dispatch("a@x.com", "Re: hi", "body", false)
            .await
            .unwrap();

        assert_eq!(outcome.status, "queued");
        assert_eq!(mailbox.send_count(), 0);
        assert_eq!(store.recent_outbox(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn auto_dispatch_without_live_send_simulates() {
        let store = store().await;
        let mailbox = Arc::new(MockMailbox::new(false));
        let dispatcher = Dispatcher::new(Some(mailbox.clone()), Arc::clone(&store), false);

        let outcome = dispatcher
            .dispatch("a@x.com", "Re: hi", "body", true)
            .await
            .unwrap();

        assert_eq!(outcome.status, "queued(simulated)");
        assert_eq!(mailbox.send_count(), 0);
    }

    #[tokio::test]
    async fn auto_live_dispatch_transmits_and_records_success() {
        let store = store().await;
        let mailbox = Arc::new(MockMailbox::new(false));
        let dispatcher = Dispatcher::new(Some(mailbox.clone()), Arc::clone(&store), true);

        let outcome = dispatcher
            .dispatch("a@x.com", "Re: hi", "body", true)
            .await
            .unwrap();

        assert_eq!(outcome.status, "sent(smtp)");
        assert_eq!(mailbox.send_count(), 1);

        let rows = store.recent_outbox(10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].auto);
        assert_eq!(rows[0].status, "sent(smtp)");
    }

    #[tokio::test]
    async fn auto_live_dispatch_records_failure_as_status() {
        let store = store().await;
        let mailbox = Arc::new(MockMailbox::new(true));
        let dispatcher = Dispatcher::new(Some(mailbox), Arc::clone(&store), true);

        let outcome = dispatcher
            .dispatch("a@x.com", "Re: hi", "body", true)
            .await
            .unwrap();

        assert!(outcome.status.starts_with("send_error:"));
        assert_ne!(outcome.status, "sent(smtp)");

        // The failed attempt is still visible in the outbox.
        let rows = store.recent_outbox(10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].status.starts_with("send_error:"));
    }

    #[tokio::test]
    async fn auto_live_dispatch_without_mailbox_records_error() {
        let store = store().await;
        let dispatcher = Dispatcher::new(None, Arc::clone(&store), true);

        let outcome = dispatcher
            .dispatch("a@x.com", "Re: hi", "body", true)
            .await
            .unwrap();

        assert!(outcome.status.starts_with("send_error:"));
        assert_eq!(store.recent_outbox(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn every_dispatch_writes_exactly_one_record() {
        let store = store().await;
        let mailbox = Arc::new(MockMailbox::new(false));
        let dispatcher = Dispatcher::new(Some(mailbox), Arc::clone(&store), true);

        dispatcher.dispatch("a@x.com", "s", "b", false).await.unwrap();
        dispatcher.dispatch("a@x.com", "s", "b", true).await.unwrap();
        dispatcher.dispatch("a@x.com", "s", "b", true).await.unwrap();

        assert_eq!(store.recent_outbox(10).await.unwrap().len(), 3);
    }
}
