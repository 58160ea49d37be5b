// Outbound message shapes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A composed notification, ready for a delivery channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "snake_case")]
pub enum Message {
    Email {
        to: String,
        subject: String,
        body: String,
    },
    /// Prefilled wa.me deep link; a person opens it and presses send
    WhatsApp { phone: String, link: String },
}

impl Message {
    pub fn channel(&self) -> &'static str {
        match self {
            Message::Email { .. } => "email",
            Message::WhatsApp { .. } => "whatsapp",
        }
    }

    pub fn recipient(&self) -> &str {
        match self {
            Message::Email { to, .. } => to,
            Message::WhatsApp { phone, .. } => phone,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent { at: DateTime<Utc> },
    Failed { reason: String },
    Skipped { reason: String },
}

impl DeliveryStatus {
    pub fn is_sent(&self) -> bool {
        matches!(self, DeliveryStatus::Sent { .. })
    }
}
