// Role catalog and the role → action matrix

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Single authorization tag carried by every actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Comercial,
    Agente,
    Siniestros,
    Cobranza,
    Usuario,
    Invitado,
}

/// Operations the back office gates behind a role check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    ViewClients,
    ManageClients,
    ViewPolicies,
    CreatePolicy,
    EditPolicy,
    ValidatePolicy,
    CancelPolicy,
    RenewPolicy,
    ViewClaims,
    CreateClaim,
    EditClaim,
    ChangeClaimStatus,
    ReassignClaim,
    ViewDocuments,
    UploadDocument,
    DiscardDocument,
    RestoreDocument,
    PurgeDocument,
    ViewAllDocuments,
    PurgeRecords,
    TransferOwnership,
    ManageActors,
    ManageTeams,
    ViewAudit,
}

#[derive(Debug, Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl Role {
    pub const ALL: [Role; 7] = [
        Role::Admin,
        Role::Comercial,
        Role::Agente,
        Role::Siniestros,
        Role::Cobranza,
        Role::Usuario,
        Role::Invitado,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Comercial => "comercial",
            Role::Agente => "agente",
            Role::Siniestros => "siniestros",
            Role::Cobranza => "cobranza",
            Role::Usuario => "usuario",
            Role::Invitado => "invitado",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Roles that only see and touch records owned by themselves or their team
    pub fn is_owner_scoped(&self) -> bool {
        matches!(self, Role::Agente | Role::Cobranza)
    }

    /// Role matrix. Admin is granted everything.
    pub fn permits(&self, action: Action) -> bool {
        use Action::*;

        match self {
            Role::Admin => true,
            Role::Comercial => matches!(
                action,
                ViewClients
                    | ManageClients
                    | ViewPolicies
                    | CreatePolicy
                    | EditPolicy
                    | ValidatePolicy
                    | CancelPolicy
                    | RenewPolicy
                    | ViewClaims
                    | ViewDocuments
                    | UploadDocument
                    | DiscardDocument
                    | ViewAudit
            ),
            Role::Agente => matches!(
                action,
                ViewClients
                    | ManageClients
                    | ViewPolicies
                    | CreatePolicy
                    | EditPolicy
                    | ViewClaims
                    | CreateClaim
                    | ViewDocuments
                    | UploadDocument
            ),
            Role::Siniestros => matches!(
                action,
                ViewClients
                    | ViewPolicies
                    | ViewClaims
                    | CreateClaim
                    | EditClaim
                    | ChangeClaimStatus
                    | ReassignClaim
                    | ViewDocuments
                    | UploadDocument
                    | DiscardDocument
                    | ViewAudit
            ),
            Role::Cobranza | Role::Usuario => {
                matches!(action, ViewClients | ViewPolicies | ViewClaims | ViewDocuments)
            }
            Role::Invitado => matches!(action, ViewPolicies),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .iter()
            .copied()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

impl Action {
    pub const ALL: [Action; 24] = [
        Action::ViewClients,
        Action::ManageClients,
        Action::ViewPolicies,
        Action::CreatePolicy,
        Action::EditPolicy,
        Action::ValidatePolicy,
        Action::CancelPolicy,
        Action::RenewPolicy,
        Action::ViewClaims,
        Action::CreateClaim,
        Action::EditClaim,
        Action::ChangeClaimStatus,
        Action::ReassignClaim,
        Action::ViewDocuments,
        Action::UploadDocument,
        Action::DiscardDocument,
        Action::RestoreDocument,
        Action::PurgeDocument,
        Action::ViewAllDocuments,
        Action::PurgeRecords,
        Action::TransferOwnership,
        Action::ManageActors,
        Action::ManageTeams,
        Action::ViewAudit,
    ];
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // snake_case, same spelling as the serialized form
        let name = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| format!("{self:?}"));
        f.write_str(&name)
    }
}
