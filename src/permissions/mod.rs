// Permission oracle
//
// Role matrix, request-scoped capabilities and the oracle trait every
// component consults before mutating anything.

pub mod context;
pub mod oracle;
pub mod roles;

pub use context::{Actor, CapabilitySet, RequestContext};
pub use oracle::{Decision, Ownership, PermissionOracle, RoleBasedOracle};
pub use roles::{Action, Role, UnknownRole};
