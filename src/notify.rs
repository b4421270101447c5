//! Notification and email dispatch - the collaborator interface the core
//! calls after a state change.
//!
//! Both channels are fire-and-forget: the core wraps every call in
//! [`notify_best_effort`] / [`email_best_effort`], which log a failure and
//! move on. A failed notification never aborts the operation that triggered
//! it.

use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use tracing::{info, warn};

use crate::{entities::notification, errors::Result};

/// Outbound messaging used by the core after allocations, rejections,
/// anomaly flags, and transporter assignments.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers an in-app message from one user to another.
    async fn notify(&self, sender_id: i64, receiver_id: i64, message: &str) -> Result<()>;

    /// Dispatches an email. `html` is an optional rich-text alternative.
    async fn send_email(&self, to: &str, subject: &str, text: &str, html: Option<&str>)
    -> Result<()>;
}

/// Persists notifications as rows and hands email off to the external
/// dispatcher (represented here by a log line; actual SMTP is owned by the
/// platform's mail service).
pub struct DbNotifier {
    db: DatabaseConnection,
}

impl DbNotifier {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Notifier for DbNotifier {
    async fn notify(&self, sender_id: i64, receiver_id: i64, message: &str) -> Result<()> {
        let row = notification::ActiveModel {
            sender_id: Set(sender_id),
            receiver_id: Set(receiver_id),
            message: Set(message.to_string()),
            is_read: Set(false),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        };
        row.insert(&self.db).await?;
        Ok(())
    }

    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        _text: &str,
        _html: Option<&str>,
    ) -> Result<()> {
        info!("Email queued to {to}: {subject}");
        Ok(())
    }
}

/// Discards everything. Used in tests and batch jobs that should stay quiet.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify(&self, _sender_id: i64, _receiver_id: i64, _message: &str) -> Result<()> {
        Ok(())
    }

    async fn send_email(
        &self,
        _to: &str,
        _subject: &str,
        _text: &str,
        _html: Option<&str>,
    ) -> Result<()> {
        Ok(())
    }
}

/// Sends a notification, logging instead of failing.
pub async fn notify_best_effort(
    notifier: &dyn Notifier,
    sender_id: i64,
    receiver_id: i64,
    message: &str,
) {
    if let Err(e) = notifier.notify(sender_id, receiver_id, message).await {
        warn!("Notification to user {receiver_id} failed: {e}");
    }
}

/// Sends an email, logging instead of failing.
pub async fn email_best_effort(
    notifier: &dyn Notifier,
    to: &str,
    subject: &str,
    text: &str,
    html: Option<&str>,
) {
    if let Err(e) = notifier.send_email(to, subject, text, html).await {
        warn!("Email to {to} failed: {e}");
    }
}
