// agency-desk library - insurance agency back office
// Exposes the workflow core for the CLI and for integration tests

pub mod cli;
pub mod clock;
pub mod config;
pub mod desk;
pub mod documents;
pub mod entities;
pub mod errors;
pub mod notifications;
pub mod observability;
pub mod permissions;
pub mod results;
pub mod storage;
pub mod store;
pub mod teams;
pub mod telemetry;
pub mod workflows;

// Re-export key types for easy access
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::DeskConfig;
pub use desk::{BackOffice, BackOfficeBuilder, DeskSummary, Notified};
pub use documents::{Document, DocumentLifecycleManager, DocumentState, NewDocument, PurgeReport};
pub use entities::{
    Claim, Client, EntityKind, EntityRef, EntityRepository, ListQuery, NewClaim, NewClient, NewPolicy, Page,
    Policy, PolicyPatch,
};
pub use errors::{DeskError, ErrorKind, StoreError};
pub use notifications::{DeliveryStatus, Message, NotificationChannel, NotificationComposer};
pub use observability::{desk_metrics, DeskMetrics, OperationTimer};
pub use permissions::{Action, Actor, PermissionOracle, RequestContext, Role, RoleBasedOracle};
pub use results::{ListResult, MutationResult};
pub use storage::{LocalObjectStorage, ObjectStorage, StorageError};
pub use store::{DeskStore, InMemoryStore, SnapshotFile};
pub use teams::{ActorDirectory, TransferCoordinator, TransferReport, TransferScope};
pub use telemetry::{create_operation_span, generate_correlation_id, init_telemetry};
pub use workflows::{ClaimWorkflow, EditGrant, PolicyStateMachine, PolicyStatus};
