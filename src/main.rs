use std::sync::Arc;

use inbox_agent::api::{AppState, routes};
use inbox_agent::compose::{Composer, LlmBackend, LlmConfig, create_generator};
use inbox_agent::config::{AgentConfig, MailboxConfig};
use inbox_agent::dispatch::Dispatcher;
use inbox_agent::mailbox::{ImapMailbox, Mailbox};
use inbox_agent::mode::ModeService;
use inbox_agent::poller::{PollerDeps, spawn_poller};
use inbox_agent::store::{LibSqlStore, Store};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AgentConfig::from_env();

    eprintln!("📬 Inbox Agent v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://0.0.0.0:{}", config.http_port);
    eprintln!("   Poll interval: {}s", config.poll_interval_secs);
    eprintln!(
        "   Live send: {}",
        if config.live_send { "ON" } else { "off (simulated)" }
    );

    // ── Database ─────────────────────────────────────────────────────────
    let store: Arc<dyn Store> = Arc::new(
        LibSqlStore::new_local(std::path::Path::new(&config.db_path))
            .await
            .unwrap_or_else(|e| {
                eprintln!("Error: Failed to open database at {}: {}", config.db_path, e);
                std::process::exit(1);
            }),
    );
    eprintln!("   Database: {}", config.db_path);

    // ── Operating mode ───────────────────────────────────────────────────
    let mode = Arc::new(ModeService::load(Arc::clone(&store)).await?);
    eprintln!("   Mode: {}", mode.get().as_str());

    // ── Mailbox transport (optional) ─────────────────────────────────────
    let mailbox: Option<Arc<dyn Mailbox>> = match MailboxConfig::from_env() {
        Some(mailbox_config) => match ImapMailbox::new(mailbox_config.clone()) {
            Ok(mb) => {
                eprintln!(
                    "   Mailbox: enabled (IMAP: {}, SMTP: {})",
                    mailbox_config.imap_host, mailbox_config.smtp_host
                );
                Some(Arc::new(mb))
            }
            Err(e) => {
                eprintln!("   Mailbox: disabled ({})", e);
                None
            }
        },
        None => {
            eprintln!("   Mailbox: disabled (IMAP_HOST not set)");
            None
        }
    };

    // ── Reply composer ───────────────────────────────────────────────────
    let llm_config = llm_config_from_env();
    let composer = Arc::new(match &llm_config {
        Some(cfg) => match create_generator(cfg) {
            Ok(generator) => {
                eprintln!("   Replies: generative (model: {})", cfg.model);
                Composer::new(generator)
            }
            Err(e) => {
                eprintln!("   Replies: templates only ({})", e);
                Composer::template_only()
            }
        },
        None => {
            eprintln!("   Replies: templates only (no API key set)");
            Composer::template_only()
        }
    });

    let dispatcher = Arc::new(Dispatcher::new(
        mailbox.clone(),
        Arc::clone(&store),
        config.live_send,
    ));

    // ── Background poller ────────────────────────────────────────────────
    let _poller = mailbox.as_ref().map(|mb| {
        spawn_poller(PollerDeps {
            config: config.clone(),
            mailbox: Arc::clone(mb),
            store: Arc::clone(&store),
            composer: Arc::clone(&composer),
            dispatcher: Arc::clone(&dispatcher),
            mode: Arc::clone(&mode),
        })
    });
    if _poller.is_none() {
        eprintln!("   Poller: disabled (no mailbox)");
    }

    // ── HTTP API ─────────────────────────────────────────────────────────
    let app = routes(AppState {
        store,
        mailbox,
        composer,
        dispatcher,
        mode,
        inbox_limit: config.inbox_limit,
    });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.http_port)).await?;
    tracing::info!(port = config.http_port, "HTTP API started");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Generative backend from environment: `ANTHROPIC_API_KEY` wins, then
/// `OPENAI_API_KEY`. `LLM_MODEL` overrides the per-backend default.
fn llm_config_from_env() -> Option<LlmConfig> {
    if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
        return Some(LlmConfig {
            backend: LlmBackend::Anthropic,
            api_key: secrecy::SecretString::from(key),
            model: std::env::var("LLM_MODEL")
                .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string()),
        });
    }
    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        return Some(LlmConfig {
            backend: LlmBackend::OpenAi,
            api_key: secrecy::SecretString::from(key),
            model: std::env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
        });
    }
    None
}
