// Record types owned by the entity repository

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use uuid::Uuid;

use crate::workflows::PolicyStatus;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Actor,
    Team,
    Client,
    Policy,
    Claim,
    Document,
    EditGrant,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Actor => "actor",
            EntityKind::Team => "team",
            EntityKind::Client => "client",
            EntityKind::Policy => "policy",
            EntityKind::Claim => "claim",
            EntityKind::Document => "document",
            EntityKind::EditGrant => "edit grant",
        };
        f.write_str(name)
    }
}

/// Typed pointer to a stored record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntityRef {
    Client(Uuid),
    Policy(Uuid),
    Claim(Uuid),
    Document(Uuid),
    Actor(Uuid),
    Team(Uuid),
}

impl EntityRef {
    pub fn id(&self) -> Uuid {
        match self {
            EntityRef::Client(id)
            | EntityRef::Policy(id)
            | EntityRef::Claim(id)
            | EntityRef::Document(id)
            | EntityRef::Actor(id)
            | EntityRef::Team(id) => *id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRef::Client(_) => EntityKind::Client,
            EntityRef::Policy(_) => EntityKind::Policy,
            EntityRef::Claim(_) => EntityKind::Claim,
            EntityRef::Document(_) => EntityKind::Document,
            EntityRef::Actor(_) => EntityKind::Actor,
            EntityRef::Team(_) => EntityKind::Team,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.id())
    }
}

/// Policy holder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub full_name: String,
    pub tax_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewClient {
    pub full_name: String,
    pub tax_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Defaults to the creating actor
    #[serde(default)]
    pub owner_id: Option<Uuid>,
}

/// Field edits; an empty string clears an optional contact field
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientPatch {
    pub full_name: Option<String>,
    pub tax_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl ClientPatch {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.tax_id.is_none()
            && self.email.is_none()
            && self.phone.is_none()
    }

    pub(crate) fn apply(&self, client: &mut Client) {
        if let Some(name) = &self.full_name {
            client.full_name = name.trim().to_string();
        }
        if let Some(tax_id) = &self.tax_id {
            client.tax_id = tax_id.trim().to_uppercase();
        }
        if let Some(email) = &self.email {
            client.email = non_empty(email).map(|e| e.to_lowercase());
        }
        if let Some(phone) = &self.phone {
            client.phone = non_empty(phone);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationStamp {
    pub validated_by: Uuid,
    pub validated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionNote {
    pub reason: String,
    pub rejected_by: Uuid,
    pub rejected_at: DateTime<Utc>,
}

/// Insurance contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: Uuid,
    pub number: String,
    pub client_id: Uuid,
    pub line_of_business: String,
    pub insurer: String,
    pub status: PolicyStatus,
    pub responsible_id: Uuid,
    pub created_by: Uuid,
    pub premium: Decimal,
    pub currency: String,
    pub valid_from: NaiveDate,
    pub valid_to: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationStamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection: Option<RejectionNote>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Policy {
    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::Policy(self.id)
    }

    /// Drops validator identity and timestamp
    pub(crate) fn clear_validation(&mut self) {
        self.validation = None;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPolicy {
    pub number: String,
    pub client_id: Uuid,
    pub line_of_business: String,
    pub insurer: String,
    pub premium: Decimal,
    pub currency: String,
    pub valid_from: NaiveDate,
    pub valid_to: NaiveDate,
    /// Defaults to the creating actor
    #[serde(default)]
    pub responsible_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyPatch {
    pub number: Option<String>,
    pub line_of_business: Option<String>,
    pub insurer: Option<String>,
    pub premium: Option<Decimal>,
    pub currency: Option<String>,
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
}

impl PolicyPatch {
    pub fn is_empty(&self) -> bool {
        self.number.is_none()
            && self.line_of_business.is_none()
            && self.insurer.is_none()
            && self.premium.is_none()
            && self.currency.is_none()
            && self.valid_from.is_none()
            && self.valid_to.is_none()
    }

    pub(crate) fn apply(&self, policy: &mut Policy) {
        if let Some(number) = &self.number {
            policy.number = number.trim().to_string();
        }
        if let Some(line) = &self.line_of_business {
            policy.line_of_business = line.trim().to_lowercase();
        }
        if let Some(insurer) = &self.insurer {
            policy.insurer = insurer.trim().to_string();
        }
        if let Some(premium) = self.premium {
            policy.premium = premium;
        }
        if let Some(currency) = &self.currency {
            policy.currency = currency.trim().to_uppercase();
        }
        if let Some(from) = self.valid_from {
            policy.valid_from = from;
        }
        if let Some(to) = self.valid_to {
            policy.valid_to = to;
        }
    }
}

/// Incident report ("siniestro") filed against a policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub id: Uuid,
    pub number: String,
    pub policy_id: Uuid,
    /// Code from the claim status catalog
    pub status: String,
    pub responsible_id: Uuid,
    pub created_by: Uuid,
    pub description: String,
    pub incident_date: NaiveDate,
    pub coverages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Claim {
    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::Claim(self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewClaim {
    pub policy_id: Uuid,
    pub description: String,
    pub incident_date: NaiveDate,
    pub coverages: Vec<String>,
    #[serde(default)]
    pub responsible_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaimPatch {
    pub description: Option<String>,
    pub incident_date: Option<NaiveDate>,
    pub coverages: Option<Vec<String>>,
}

impl ClaimPatch {
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.incident_date.is_none() && self.coverages.is_none()
    }
}

/// Loose shape check for contact emails
pub(crate) fn is_valid_email(value: &str) -> bool {
    EMAIL_PATTERN.is_match(value)
}

pub(crate) fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
