// Delivery channels for composed messages

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use super::types::Message;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("delivery rejected by {channel}: {reason}")]
    Rejected { channel: String, reason: String },

    #[error("notification channel unavailable: {0}")]
    Unavailable(String),
}

/// Outbound delivery. Implementations talk to mail relays or messaging
/// gateways; callers bound each send with a timeout.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, message: &Message) -> Result<(), NotificationError>;
}

/// Writes messages to the log instead of delivering them
#[derive(Debug, Default, Clone, Copy)]
pub struct LogChannel;

#[async_trait]
impl NotificationChannel for LogChannel {
    async fn send(&self, message: &Message) -> Result<(), NotificationError> {
        match message {
            Message::Email { to, subject, .. } => {
                info!(channel = "email", to = %to, subject = %subject, "Notification composed");
            }
            Message::WhatsApp { phone, link } => {
                info!(channel = "whatsapp", phone = %phone, link = %link, "Notification composed");
            }
        }
        Ok(())
    }
}
