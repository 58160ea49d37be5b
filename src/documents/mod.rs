// Document soft-delete lattice and storage release

pub mod lifecycle;
pub mod types;

pub use lifecycle::{DocumentLifecycleManager, DocumentSettings};
pub use types::{Document, DocumentState, NewDocument, PurgeManifest, PurgeReport};
