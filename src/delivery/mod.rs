//! Report delivery over a template-messaging API: upload once, then send per recipient.

pub mod whatsapp;

pub use whatsapp::WhatsAppClient;

use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use crate::error::AppResult;
use crate::telemetry::metrics::{MESSAGES_FAILED, MESSAGES_SENT};

/// The pre-approved template plus the uploaded document shown in its header.
#[derive(Debug, Clone)]
pub struct DocumentTemplate {
    pub name: String,
    pub language: String,
    pub media_id: String,
    pub filename: String,
}

#[async_trait::async_trait]
pub trait Messenger: Send + Sync {
    /// Uploads a PDF and returns the media handle the API assigned to it.
    async fn upload_media(&self, path: &Path) -> AppResult<String>;

    /// Sends the template to one recipient and returns the message id.
    async fn send_template(&self, recipient: &str, template: &DocumentTemplate) -> AppResult<String>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeliverySummary {
    pub sent: usize,
    pub failed: Vec<(String, String)>,
}

impl DeliverySummary {
    pub fn attempted(&self) -> usize {
        self.sent + self.failed.len()
    }

    pub fn all_failed(&self) -> bool {
        self.sent == 0 && !self.failed.is_empty()
    }
}

/// Sends `template` to every recipient in order. A failed send is recorded and
/// the pass moves on; `send_delay` separates consecutive recipients.
#[tracing::instrument(
    name = "pipeline_stage deliver",
    skip(messenger, template, recipients),
    fields(recipients = recipients.len(), sent = tracing::field::Empty, failed = tracing::field::Empty)
)]
pub async fn deliver_to_all(
    messenger: &dyn Messenger,
    template: &DocumentTemplate,
    recipients: &[String],
    send_delay: Duration,
) -> DeliverySummary {
    let mut summary = DeliverySummary::default();

    for (i, recipient) in recipients.iter().enumerate() {
        if i > 0 && !send_delay.is_zero() {
            tokio::time::sleep(send_delay).await;
        }
        match messenger.send_template(recipient, template).await {
            Ok(message_id) => {
                tracing::info!(recipient = %recipient, message_id = %message_id, "template message sent");
                MESSAGES_SENT.add(1, &[]);
                summary.sent += 1;
            }
            Err(err) => {
                tracing::warn!(recipient = %recipient, error = %err, "template message failed");
                MESSAGES_FAILED.add(1, &[]);
                summary.failed.push((recipient.clone(), err.to_string()));
            }
        }
    }

    let span = tracing::Span::current();
    span.record("sent", summary.sent);
    span.record("failed", summary.failed.len());
    tracing::info!(
        sent = summary.sent,
        failed = summary.failed.len(),
        "delivery pass finished"
    );
    summary
}
