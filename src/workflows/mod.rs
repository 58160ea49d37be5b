// Record lifecycles: policy state machine, claim statuses, edit grants, audit

pub mod audit;
pub mod claims;
pub mod edit_grants;
pub mod state_machine;

pub use audit::{AuditRecord, AuditTrail};
pub use claims::{
    ClaimStatusCatalog, ClaimStatusDef, ClaimTransition, ClaimWorkflow, ClosureKind, StatusClass,
};
pub use edit_grants::{EditGrant, EditGrantLedger};
pub use state_machine::{
    EditEffect, PolicyStateMachine, PolicyStatus, RejectionOutcome, RenewalOutcome,
    WorkflowSettings,
};
