// Notification composer - pure message building, no I/O

use chrono::{DateTime, Utc};
use url::Url;

use super::types::Message;
use crate::entities::types::is_valid_email;
use crate::entities::{Claim, Client, Policy};
use crate::errors::DeskError;
use crate::permissions::Actor;
use crate::workflows::ClosureKind;

#[derive(Debug, Clone)]
pub struct NotificationSettings {
    pub agency_name: String,
    /// Prefixed to ten-digit national numbers
    pub country_code: String,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            agency_name: "Agencia de Seguros".to_string(),
            country_code: "52".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NotificationComposer {
    settings: NotificationSettings,
}

impl NotificationComposer {
    pub fn new(settings: NotificationSettings) -> Self {
        Self { settings }
    }

    /// Email to the policy's creator explaining the rejection and the
    /// deadline for correcting it
    pub fn compose_rejection_notice(
        &self,
        policy: &Policy,
        creator: &Actor,
        reason: &str,
        deadline: DateTime<Utc>,
    ) -> Result<Message, DeskError> {
        let to = valid_email(Some(&creator.email)).ok_or_else(|| DeskError::MissingContact {
            recipient: creator.full_name.clone(),
            detail: "creator has no valid email address".to_string(),
        })?;

        let subject = format!("Póliza {} rechazada", policy.number);
        let body = format!(
            "Hola {name},\n\n\
             La póliza {number} ({insurer}, {line}) fue rechazada por el siguiente motivo:\n\n\
             {reason}\n\n\
             Puedes corregirla y reenviarla a validación hasta el {deadline} (UTC). \
             Al vencer ese plazo ya no podrá editarse y quedará rechazada.\n\n\
             {agency}",
            name = creator.full_name,
            number = policy.number,
            insurer = policy.insurer,
            line = policy.line_of_business,
            reason = reason.trim(),
            deadline = deadline.format("%Y-%m-%d %H:%M"),
            agency = self.settings.agency_name,
        );

        Ok(Message::Email { to, subject, body })
    }

    /// WhatsApp link to the client's phone, falling back to email
    pub fn compose_closure_notice(
        &self,
        claim: &Claim,
        client: &Client,
        closure: ClosureKind,
    ) -> Result<Message, DeskError> {
        let outcome = match closure {
            ClosureKind::Settled => "fue resuelto y el pago fue autorizado",
            ClosureKind::Rejected => "fue dictaminado como improcedente",
            ClosureKind::Withdrawn => "fue cerrado a petición tuya",
        };
        let text = format!(
            "Hola {}, te informamos que tu siniestro {} {}. Para cualquier duda responde a este mensaje. {}",
            client.full_name, claim.number, outcome, self.settings.agency_name
        );

        if let Some(phone) = client.phone.as_deref().and_then(|p| self.whatsapp_number(p)) {
            let link = Url::parse_with_params(&format!("https://wa.me/{phone}"), &[("text", &text)])
                .map_err(|e| DeskError::validation(format!("cannot build WhatsApp link: {e}")))?;
            return Ok(Message::WhatsApp {
                phone,
                link: link.to_string(),
            });
        }

        if let Some(to) = valid_email(client.email.as_deref()) {
            return Ok(Message::Email {
                to,
                subject: format!("Siniestro {} cerrado", claim.number),
                body: text,
            });
        }

        Err(DeskError::MissingContact {
            recipient: client.full_name.clone(),
            detail: "client has neither a usable phone nor an email".to_string(),
        })
    }

    /// Digits in international form, or None when the number is unusable
    fn whatsapp_number(&self, raw: &str) -> Option<String> {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        let full = match digits.len() {
            10 => format!("{}{}", self.settings.country_code, digits),
            11..=15 => digits,
            _ => return None,
        };
        Some(full)
    }
}

fn valid_email(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|e| is_valid_email(e))
        .map(str::to_lowercase)
}
