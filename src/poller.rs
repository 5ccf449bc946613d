//! Poll Cycle Orchestrator — the periodic inbox triage loop.
//!
//! One spawned task owns the loop; each cycle is awaited inline before the
//! next tick is taken, so two cycles can never run concurrently
//! (single-flight). `MissedTickBehavior::Delay` makes a long cycle push the
//! next tick out instead of bursting.
//!
//! Per cycle: list unread candidates → skip already-processed and automated
//! senders → classify → compose → dispatch → record in the processed ledger
//! → one batched mark-seen for everything auto-handled. A single message's
//! failure is logged and the cycle moves on.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::classify::classify;
use crate::compose::Composer;
use crate::config::AgentConfig;
use crate::dispatch::Dispatcher;
use crate::error::StoreError;
use crate::mailbox::{MailMessage, Mailbox};
use crate::mode::{ModeService, OperatingMode};
use crate::store::Store;

/// Everything a poll cycle needs.
pub struct PollerDeps {
    pub config: AgentConfig,
    pub mailbox: Arc<dyn Mailbox>,
    pub store: Arc<dyn Store>,
    pub composer: Arc<Composer>,
    pub dispatcher: Arc<Dispatcher>,
    pub mode: Arc<ModeService>,
}

/// Spawn the background poller.
///
/// Returns a `JoinHandle` and a shutdown flag. Set the flag to stop polling
/// after the current cycle.
pub fn spawn_poller(deps: PollerDeps) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        info!(
            interval_secs = deps.config.poll_interval_secs,
            "Inbox poller started"
        );

        let mut tick =
            tokio::time::interval(Duration::from_secs(deps.config.poll_interval_secs));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tick.tick().await;

            if shutdown.load(Ordering::Relaxed) {
                info!("Inbox poller shutting down");
                return;
            }

            // Awaited inline: the next tick cannot fire until this returns.
            run_cycle(&deps).await;
        }
    });

    (handle, shutdown_flag)
}

/// Case-insensitive substring match of the sender against the deny-list.
pub fn is_automated_sender(deny_list: &[String], sender: &str) -> bool {
    let sender = sender.to_lowercase();
    deny_list.iter().any(|key| sender.contains(&key.to_lowercase()))
}

/// Run a single poll cycle. Transport failure of the listing aborts only
/// this cycle; the next tick retries.
pub async fn run_cycle(deps: &PollerDeps) {
    let candidates = match deps
        .mailbox
        .list_candidates(true, deps.config.inbox_limit)
        .await
    {
        Ok(messages) => messages,
        Err(e) => {
            error!(error = %e, "Inbox listing failed, retrying next cycle");
            return;
        }
    };

    if candidates.is_empty() {
        return;
    }

    debug!(count = candidates.len(), "Fetched unread candidates");

    // Cycle-scoped fast set; the durable ledger below is authoritative.
    let mut handled_this_cycle: HashSet<String> = HashSet::new();
    let mut to_mark_seen: Vec<String> = Vec::new();

    for message in &candidates {
        if handled_this_cycle.contains(&message.id) {
            continue;
        }

        match deps.store.is_processed(&message.id).await {
            Ok(true) => {
                // Reappeared despite the ledger record (e.g. a crash before
                // mark-seen, or manual mode leaving it unread). Skip.
                debug!(id = %message.id, "Already in processed ledger, skipping");
                handled_this_cycle.insert(message.id.clone());
                continue;
            }
            Ok(false) => {}
            Err(e) => {
                error!(id = %message.id, error = %e, "Ledger lookup failed, skipping message");
                continue;
            }
        }

        if is_automated_sender(&deps.config.deny_list, &message.sender) {
            debug!(id = %message.id, sender = %message.sender, "Automated sender, not replying");
            if let Err(e) = deps.store.record_processed(&message.id).await {
                error!(id = %message.id, error = %e, "Failed to record skipped message");
            }
            handled_this_cycle.insert(message.id.clone());
            continue;
        }

        match handle_message(deps, message).await {
            Ok(mark_seen) => {
                if mark_seen {
                    to_mark_seen.push(message.id.clone());
                }
            }
            Err(e) => {
                error!(id = %message.id, error = %e, "Failed to process message");
            }
        }
        handled_this_cycle.insert(message.id.clone());
    }

    // One batched call for everything auto-handled this cycle.
    if !to_mark_seen.is_empty()
        && let Err(e) = deps.mailbox.mark_seen(&to_mark_seen).await
    {
        warn!(count = to_mark_seen.len(), error = %e, "Failed to mark messages seen");
    }
}

/// Classify → compose → dispatch → record one message.
///
/// Returns whether the message should join the mark-seen batch (auto mode
/// only — queued manual replies stay unread for the operator).
async fn handle_message(deps: &PollerDeps, message: &MailMessage) -> Result<bool, StoreError> {
    let auto = deps.mode.get() == OperatingMode::Auto;

    let classification = classify(&message.subject, &message.body);
    info!(
        id = %message.id,
        intent = classification.intent.label(),
        subject = %message.subject,
        "Processing message"
    );

    let draft = deps
        .composer
        .compose(
            &message.sender,
            &message.subject,
            &message.body,
            classification.intent,
        )
        .await;

    // Dispatch failures surface as outbox status rows, not errors.
    let outcome = deps
        .dispatcher
        .dispatch(
            &message.sender,
            &format!("Re: {}", message.subject),
            &draft,
            auto,
        )
        .await?;

    deps.store.record_processed(&message.id).await?;

    debug!(id = %message.id, status = %outcome.status, "Message handled");
    Ok(auto)
}
