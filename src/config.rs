//! Configuration types, built from environment variables.

/// Senders that never get an automated reply (bounce loops, notification
/// floods). Matched as case-insensitive substrings of the sender address.
pub const DEFAULT_DENY_LIST: &[&str] = &[
    "no-reply",
    "noreply",
    "notification",
    "alert",
    "mailer-daemon",
    "postmaster",
    "bounce",
    "failure",
];

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Seconds between poll cycles.
    pub poll_interval_secs: u64,
    /// Maximum candidate messages fetched per cycle.
    pub inbox_limit: usize,
    /// Automated-sender deny-list (substring match, case-insensitive).
    pub deny_list: Vec<String>,
    /// Path to the local database file.
    pub db_path: String,
    /// HTTP API bind port.
    pub http_port: u16,
    /// Whether auto mode actually transmits via SMTP. When false, auto-mode
    /// dispatches record `queued(simulated)` instead of sending.
    pub live_send: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            inbox_limit: 25,
            deny_list: DEFAULT_DENY_LIST.iter().map(|s| s.to_string()).collect(),
            db_path: "./data/inbox-agent.db".to_string(),
            http_port: 8000,
            live_send: false,
        }
    }
}

impl AgentConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let poll_interval_secs = std::env::var("POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.poll_interval_secs);

        let inbox_limit = std::env::var("INBOX_LIMIT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.inbox_limit);

        let deny_list: Vec<String> = std::env::var("AUTO_SKIP_SENDERS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_lowercase())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.deny_list);

        let db_path = std::env::var("DB_PATH").unwrap_or(defaults.db_path);

        let http_port = std::env::var("HTTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.http_port);

        let live_send = std::env::var("LIVE_SEND")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(defaults.live_send);

        Self {
            poll_interval_secs,
            inbox_limit,
            deny_list,
            db_path,
            http_port,
            live_send,
        }
    }
}

/// Mailbox transport configuration.
#[derive(Debug, Clone)]
pub struct MailboxConfig {
    pub imap_host: String,
    pub imap_port: u16,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

impl MailboxConfig {
    /// Build config from environment variables.
    /// Returns `None` if `IMAP_HOST` is not set (mailbox disabled — the HTTP
    /// surface still runs, only the poller and /inbox are unavailable).
    pub fn from_env() -> Option<Self> {
        let imap_host = std::env::var("IMAP_HOST").ok()?;

        let imap_port: u16 = std::env::var("IMAP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(993);

        let smtp_host =
            std::env::var("SMTP_HOST").unwrap_or_else(|_| imap_host.replace("imap", "smtp"));

        let smtp_port: u16 = std::env::var("SMTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(587);

        let username = std::env::var("MAIL_USERNAME").unwrap_or_default();
        let password = std::env::var("MAIL_PASSWORD").unwrap_or_default();
        let from_address = std::env::var("MAIL_FROM_ADDRESS").unwrap_or_else(|_| username.clone());

        Some(Self {
            imap_host,
            imap_port,
            smtp_host,
            smtp_port,
            username,
            password,
            from_address,
        })
    }

    /// Credentials are required to open a session; an empty pair is a
    /// configuration error rather than a transport error at first poll.
    pub fn validate(&self) -> Result<(), crate::error::ConfigError> {
        if self.username.is_empty() || self.password.is_empty() {
            return Err(crate::error::ConfigError::MissingEnvVar(
                "MAIL_USERNAME / MAIL_PASSWORD".to_string(),
            ));
        }
        Ok(())
    }
}
