//! Reply composition — generative draft with a deterministic template
//! fallback.
//!
//! The [`Composer`] owns the fallback decision: a failed or empty generative
//! result selects the template path explicitly, never by propagating the
//! failure to the caller. `compose()` therefore cannot fail and cannot
//! return empty text.

use std::sync::Arc;

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use secrecy::ExposeSecret;

use crate::classify::Intent;
use crate::error::ComposeError;

// ── Generator seam ──────────────────────────────────────────────────

/// Capability to draft a reply generatively.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(
        &self,
        subject: &str,
        body: &str,
        intent: Intent,
    ) -> Result<String, ComposeError>;
}

/// Supported generative backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Anthropic,
    OpenAi,
}

/// Configuration for creating a reply generator.
#[derive(Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub api_key: secrecy::SecretString,
    pub model: String,
}

const PREAMBLE: &str = "You are a B2B operations assistant.";

fn build_prompt(subject: &str, body: &str, intent: Intent) -> String {
    format!(
        "Intent: {}\nSubject: {}\nBody: {}\n\nWrite a short, professional reply. \
         Acknowledge the request and set clear next steps. No placeholders.",
        intent.label(),
        subject,
        body
    )
}

/// Reply generator over a rig completion agent.
struct RigReplyGenerator<M: rig::completion::CompletionModel> {
    agent: rig::agent::Agent<M>,
}

#[async_trait]
impl<M: rig::completion::CompletionModel> ReplyGenerator for RigReplyGenerator<M> {
    async fn generate(
        &self,
        subject: &str,
        body: &str,
        intent: Intent,
    ) -> Result<String, ComposeError> {
        let text = self
            .agent
            .prompt(build_prompt(subject, body, intent))
            .await
            .map_err(|e| ComposeError::RequestFailed(e.to_string()))?;

        if text.trim().is_empty() {
            return Err(ComposeError::EmptyResponse);
        }
        Ok(text)
    }
}

/// Create a reply generator from configuration.
pub fn create_generator(config: &LlmConfig) -> Result<Arc<dyn ReplyGenerator>, ComposeError> {
    match config.backend {
        LlmBackend::Anthropic => {
            use rig::providers::anthropic;
            let client: anthropic::Client = anthropic::Client::new(config.api_key.expose_secret())
                .map_err(|e| ComposeError::Unavailable(format!("Anthropic client: {e}")))?;
            let agent = client.agent(&config.model).preamble(PREAMBLE).build();
            tracing::info!(model = %config.model, "Using Anthropic reply generator");
            Ok(Arc::new(RigReplyGenerator { agent }))
        }
        LlmBackend::OpenAi => {
            use rig::providers::openai;
            let client: openai::Client = openai::Client::new(config.api_key.expose_secret())
                .map_err(|e| ComposeError::Unavailable(format!("OpenAI client: {e}")))?;
            let agent = client.agent(&config.model).preamble(PREAMBLE).build();
            tracing::info!(model = %config.model, "Using OpenAI reply generator");
            Ok(Arc::new(RigReplyGenerator { agent }))
        }
    }
}

// ── Templates ───────────────────────────────────────────────────────

/// Derive a greeting name from the sender address local part.
/// `jane.doe@x.com` → `Jane Doe`; empty input → `there`.
pub fn display_name(sender: &str) -> String {
    let local = sender.split('@').next().unwrap_or("").trim();
    if local.is_empty() {
        return "there".to_string();
    }
    local
        .split(['.', '_', '-'])
        .filter(|p| !p.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Deterministic fallback reply, keyed by intent. Pure string formatting —
/// never fails, never empty.
pub fn render_template(intent: Intent, sender: &str, subject: &str) -> String {
    let name = display_name(sender);
    match intent {
        Intent::Invoice => format!(
            "Hi {name},\n\nThanks for the invoice. Our finance team will verify and \
             process it within 2-3 business days.\n\nBest regards,\nOperations"
        ),
        Intent::Complaint => format!(
            "Hi {name},\n\nSorry for the inconvenience. We've logged your complaint \
             and will update you with a resolution within 24 hours.\n\nRegards,\nSupport"
        ),
        Intent::PurchaseOrder => format!(
            "Hi {name},\n\nThanks for the PO. We have started processing and will \
             share confirmation and ship date shortly.\n\nRegards,\nOrder Management"
        ),
        Intent::Quotation => format!(
            "Dear {name},\n\nThank you for your inquiry regarding \"{subject}\". We \
             will prepare a quotation with best price and delivery schedule and send \
             it to you shortly.\n\nSincerely,\nSales"
        ),
        Intent::Inquiry => format!(
            "Hi {name},\n\nThanks for reaching out. Please share quantity and \
             timeline so we can tailor the proposal.\n\nRegards,\nSales"
        ),
    }
}

// ── Composer ────────────────────────────────────────────────────────

/// Composes reply text: generative first, template on any failure.
pub struct Composer {
    generator: Option<Arc<dyn ReplyGenerator>>,
}

impl Composer {
    /// Composer with a generative backend.
    pub fn new(generator: Arc<dyn ReplyGenerator>) -> Self {
        Self {
            generator: Some(generator),
        }
    }

    /// Template-only composer (no generative backend configured).
    pub fn template_only() -> Self {
        Self { generator: None }
    }

    /// Produce reply text for a message. Infallible: any generator failure
    /// selects the template path.
    pub async fn compose(
        &self,
        sender: &str,
        subject: &str,
        body: &str,
        intent: Intent,
    ) -> String {
        if let Some(generator) = &self.generator {
            match generator.generate(subject, body, intent).await {
                Ok(draft) => return draft,
                Err(e) => {
                    tracing::debug!(
                        intent = intent.label(),
                        error = %e,
                        "Generator failed, using template fallback"
                    );
                }
            }
        }
        render_template(intent, sender, subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_INTENTS: [Intent; 5] = [
        Intent::Invoice,
        Intent::Complaint,
        Intent::Inquiry,
        Intent::PurchaseOrder,
        Intent::Quotation,
    ];

    struct FailingGenerator;

    #[async_trait]
    impl ReplyGenerator for FailingGenerator {
        async fn generate(&self, _: &str, _: &str, _: Intent) -> Result<String, ComposeError> {
            Err(ComposeError::RequestFailed("quota exceeded".into()))
        }
    }

    struct CannedGenerator(&'static str);

    #[async_trait]
    impl ReplyGenerator for CannedGenerator {
        async fn generate(&self, _: &str, _: &str, _: Intent) -> Result<String, ComposeError> {
            Ok(self.0.to_string())
        }
    }

    // ── display_name ────────────────────────────────────────────────

    #[test]
    fn display_name_from_dotted_local_part() {
        assert_eq!(display_name("jane.doe@example.com"), "Jane Doe");
    }

    #[test]
    fn display_name_plain_local_part() {
        assert_eq!(display_name("alice@example.com"), "Alice");
    }

    #[test]
    fn display_name_empty_sender_is_there() {
        assert_eq!(display_name(""), "there");
        assert_eq!(display_name("@example.com"), "there");
    }

    // ── templates ───────────────────────────────────────────────────

    #[test]
    fn templates_are_never_empty() {
        for intent in ALL_INTENTS {
            let text = render_template(intent, "buyer@example.com", "Test subject");
            assert!(!text.trim().is_empty(), "{} template empty", intent.label());
        }
    }

    #[test]
    fn templates_safe_on_empty_sender() {
        for intent in ALL_INTENTS {
            let text = render_template(intent, "", "");
            assert!(text.contains("there"), "{} should greet 'there'", intent.label());
        }
    }

    #[test]
    fn quotation_template_echoes_subject() {
        let text = render_template(Intent::Quotation, "b@x.com", "RFQ for 300 units");
        assert!(text.contains("RFQ for 300 units"));
    }

    // ── composer fallback ───────────────────────────────────────────

    #[tokio::test]
    async fn compose_falls_back_when_generator_always_fails() {
        let composer = Composer::new(Arc::new(FailingGenerator));
        for intent in ALL_INTENTS {
            let text = composer
                .compose("buyer@example.com", "Subject", "Body", intent)
                .await;
            assert!(!text.trim().is_empty(), "{} reply empty", intent.label());
            assert_eq!(text, render_template(intent, "buyer@example.com", "Subject"));
        }
    }

    #[tokio::test]
    async fn compose_prefers_generator_output() {
        let composer = Composer::new(Arc::new(CannedGenerator("Drafted reply.")));
        let text = composer
            .compose("buyer@example.com", "Subject", "Body", Intent::Inquiry)
            .await;
        assert_eq!(text, "Drafted reply.");
    }

    #[tokio::test]
    async fn template_only_composer_never_fails() {
        let composer = Composer::template_only();
        let text = composer
            .compose("buyer@example.com", "Invoice #1", "payment", Intent::Invoice)
            .await;
        assert!(text.contains("finance team"));
    }
}
