use axum::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::info;

#[derive(Debug, Clone)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// Gateway verdict: which recipients were accepted and which bounced at
/// submission time.
#[derive(Debug, Clone, Default)]
pub struct Delivery {
    pub accepted: Vec<String>,
    pub rejected: Vec<String>,
}

impl Delivery {
    /// The gateway reports accepted recipients in submission order; callers
    /// send to one address and check the first slot.
    pub fn accepted_for(&self, recipient: &str) -> bool {
        self.accepted.first().map(|a| a == recipient).unwrap_or(false)
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &MailMessage) -> anyhow::Result<Delivery>;
}

/// Logs messages instead of delivering them and reports them accepted.
/// Default sender for local development.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &MailMessage) -> anyhow::Result<Delivery> {
        info!(to = %message.to, subject = %message.subject, "mail delivery skipped, logging only");
        Ok(Delivery {
            accepted: vec![message.to.clone()],
            rejected: Vec::new(),
        })
    }
}

/// Test double: records every submission and answers with a scripted verdict.
#[derive(Default)]
pub struct MockMailer {
    reject_all: AtomicBool,
    fail_transport: AtomicBool,
    sent: Mutex<Vec<MailMessage>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// All further sends report the recipient rejected.
    pub fn reject_deliveries(&self) {
        self.reject_all.store(true, Ordering::SeqCst);
    }

    /// All further sends fail at the transport level.
    pub fn fail_transport(&self) {
        self.fail_transport.store(true, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, message: &MailMessage) -> anyhow::Result<Delivery> {
        if self.fail_transport.load(Ordering::SeqCst) {
            anyhow::bail!("mail transport unavailable");
        }
        self.sent.lock().await.push(message.clone());
        if self.reject_all.load(Ordering::SeqCst) {
            return Ok(Delivery {
                accepted: Vec::new(),
                rejected: vec![message.to.clone()],
            });
        }
        Ok(Delivery {
            accepted: vec![message.to.clone()],
            rejected: Vec::new(),
        })
    }
}
