// Document lifecycle manager
//
// Non-admin roles may only discard. Restore, purge and the unfiltered
// listing are admin operations. Purging removes the record first and the
// storage object second; a storage failure after the record is gone is
// reported as a partial failure naming the orphaned object.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use super::types::{Document, DocumentState, NewDocument, PurgeManifest, PurgeReport};
use crate::clock::Clock;
use crate::entities::{self, EntityKind, EntityRef};
use crate::errors::DeskError;
use crate::observability::desk_metrics;
use crate::permissions::{Action, Ownership, PermissionOracle, RequestContext};
use crate::storage::{ObjectStorage, StorageError};
use crate::store::DeskStore;
use crate::telemetry::create_operation_span;
use crate::workflows::AuditTrail;

#[derive(Debug, Clone, Copy)]
pub struct DocumentSettings {
    /// Upper bound on each object storage call
    pub storage_timeout: Duration,
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            storage_timeout: Duration::from_millis(5_000),
        }
    }
}

#[derive(Clone)]
pub struct DocumentLifecycleManager {
    store: Arc<dyn DeskStore>,
    oracle: Arc<dyn PermissionOracle>,
    clock: Arc<dyn Clock>,
    storage: Arc<dyn ObjectStorage>,
    audit: AuditTrail,
    settings: DocumentSettings,
}

impl DocumentLifecycleManager {
    pub fn new(
        store: Arc<dyn DeskStore>,
        oracle: Arc<dyn PermissionOracle>,
        clock: Arc<dyn Clock>,
        storage: Arc<dyn ObjectStorage>,
        settings: DocumentSettings,
    ) -> Self {
        Self {
            audit: AuditTrail::new(store.clone(), oracle.clone()),
            store,
            oracle,
            clock,
            storage,
            settings,
        }
    }

    fn load(&self, id: Uuid) -> Result<Document, DeskError> {
        self.store
            .document(id)?
            .ok_or_else(|| DeskError::not_found(EntityKind::Document, id))
    }

    /// Ownership of the policy or claim a document hangs off
    fn parent_scope(&self, parent: EntityRef) -> Result<Ownership, DeskError> {
        let owner_id = match parent {
            EntityRef::Policy(id) => {
                self.store
                    .policy(id)?
                    .ok_or_else(|| DeskError::not_found(EntityKind::Policy, id))?
                    .responsible_id
            }
            EntityRef::Claim(id) => {
                self.store
                    .claim(id)?
                    .ok_or_else(|| DeskError::not_found(EntityKind::Claim, id))?
                    .responsible_id
            }
            other => {
                return Err(DeskError::validation(format!(
                    "documents can only be attached to policies or claims, not {}",
                    other.kind()
                )))
            }
        };
        Ok(entities::ownership(self.store.as_ref(), owner_id)?)
    }

    async fn with_timeout<T>(
        &self,
        operation: &str,
        call: impl std::future::Future<Output = Result<T, StorageError>>,
    ) -> Result<T, DeskError> {
        match tokio::time::timeout(self.settings.storage_timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(DeskError::Timeout {
                operation: operation.to_string(),
                timeout_ms: self.settings.storage_timeout.as_millis() as u64,
            }),
        }
    }

    /// Deletes one object; an object that is already gone counts as released
    async fn release(&self, path: &str) -> Result<(), DeskError> {
        match self
            .with_timeout("storage delete", self.storage.delete_object(path))
            .await
        {
            Ok(()) | Err(DeskError::Storage(StorageError::NotFound(_))) => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub async fn attach(
        &self,
        ctx: &RequestContext,
        parent: EntityRef,
        new: NewDocument,
    ) -> Result<Document, DeskError> {
        let span = create_operation_span("document.attach", ctx.correlation_id());
        async {
            let scope = self.parent_scope(parent)?;
            let actor = self.oracle.check_scoped(ctx, Action::UploadDocument, &scope)?;

            let file_name = sanitize_file_name(&new.file_name)
                .ok_or_else(|| DeskError::validation("file name is required"))?;
            let content_type = new.content_type.trim().to_lowercase();
            if content_type.is_empty() {
                return Err(DeskError::validation("content type is required"));
            }

            let id = Uuid::new_v4();
            let storage_path = format!("{}/{}/{}/{}", parent.kind(), parent.id(), id, file_name);
            self.with_timeout("storage upload", self.storage.put_object(&storage_path, &new.contents))
                .await?;

            let now = self.clock.now();
            let document = Document {
                id,
                parent,
                file_name,
                content_type,
                size_bytes: new.contents.len() as u64,
                storage_path,
                state: DocumentState::Active,
                uploaded_by: actor.id,
                uploaded_at: now,
                discarded_by: None,
                discarded_at: None,
            };

            if let Err(e) = self.store.save_document(&document) {
                // Record never landed; drop the uploaded bytes so nothing is orphaned
                if let Err(cleanup) = self.release(&document.storage_path).await {
                    warn!(path = %document.storage_path, error = %cleanup, "Upload cleanup failed");
                }
                return Err(e.into());
            }
            self.audit
                .record(document.entity_ref(), actor.id, now, "new", DocumentState::Active.as_str(), None)?;

            info!(
                correlation.id = %ctx.correlation_id(),
                document.id = %document.id,
                parent = %parent,
                bytes = document.size_bytes,
                "Document attached"
            );
            Ok(document)
        }
        .instrument(span)
        .await
    }

    /// active -> discarded. Discarding an already discarded document is a
    /// no-op success and writes no audit record.
    pub fn discard(&self, ctx: &RequestContext, document_id: Uuid) -> Result<Document, DeskError> {
        let mut document = self.load(document_id)?;
        let scope = self.parent_scope(document.parent)?;
        let actor = self.oracle.check_scoped(ctx, Action::DiscardDocument, &scope)?;

        match document.state {
            DocumentState::Discarded => return Ok(document),
            DocumentState::Deleted => {
                return Err(DeskError::invalid_transition(
                    document.entity_ref(),
                    document.state.as_str(),
                    DocumentState::Discarded.as_str(),
                    "document was deleted",
                ))
            }
            DocumentState::Active => {}
        }

        let now = self.clock.now();
        document.state = DocumentState::Discarded;
        document.discarded_by = Some(actor.id);
        document.discarded_at = Some(now);
        self.store.save_document(&document)?;
        self.audit.record(
            document.entity_ref(),
            actor.id,
            now,
            DocumentState::Active.as_str(),
            DocumentState::Discarded.as_str(),
            None,
        )?;

        info!(
            correlation.id = %ctx.correlation_id(),
            document.id = %document.id,
            actor.id = %actor.id,
            "Document discarded"
        );
        Ok(document)
    }

    /// discarded -> active, admin only
    pub fn restore(&self, ctx: &RequestContext, document_id: Uuid) -> Result<Document, DeskError> {
        let actor = self.oracle.check(ctx, Action::RestoreDocument)?;
        let mut document = self.load(document_id)?;

        if document.state != DocumentState::Discarded {
            return Err(DeskError::invalid_transition(
                document.entity_ref(),
                document.state.as_str(),
                DocumentState::Active.as_str(),
                "only discarded documents can be restored",
            ));
        }

        document.state = DocumentState::Active;
        document.discarded_by = None;
        document.discarded_at = None;
        self.store.save_document(&document)?;
        self.audit.record(
            document.entity_ref(),
            actor.id,
            self.clock.now(),
            DocumentState::Discarded.as_str(),
            DocumentState::Active.as_str(),
            None,
        )?;

        info!(
            correlation.id = %ctx.correlation_id(),
            document.id = %document.id,
            "Document restored"
        );
        Ok(document)
    }

    /// discarded -> deleted, admin only. The record is removed before the
    /// storage object; it is not put back if the storage call fails.
    pub async fn permanently_delete(
        &self,
        ctx: &RequestContext,
        document_id: Uuid,
    ) -> Result<Document, DeskError> {
        let span = create_operation_span("document.purge", ctx.correlation_id());
        async {
            let actor = self.oracle.check(ctx, Action::PurgeDocument)?;
            let mut document = self.load(document_id)?;

            if document.state != DocumentState::Discarded {
                return Err(DeskError::invalid_transition(
                    document.entity_ref(),
                    document.state.as_str(),
                    DocumentState::Deleted.as_str(),
                    "discard the document before deleting it",
                ));
            }

            self.store.remove_document(document.id)?;
            document.state = DocumentState::Deleted;
            self.audit.record(
                document.entity_ref(),
                actor.id,
                self.clock.now(),
                DocumentState::Discarded.as_str(),
                DocumentState::Deleted.as_str(),
                None,
            )?;

            if let Err(e) = self.release(&document.storage_path).await {
                desk_metrics().record_partial_failure();
                warn!(
                    correlation.id = %ctx.correlation_id(),
                    document.id = %document.id,
                    path = %document.storage_path,
                    error = %e,
                    "Document record removed but storage object remains"
                );
                return Err(DeskError::PartialFailure {
                    message: format!("document {} was deleted but its file could not be removed: {e}", document.id),
                    orphaned: vec![document.storage_path],
                });
            }

            info!(
                correlation.id = %ctx.correlation_id(),
                document.id = %document.id,
                "Document permanently deleted"
            );
            Ok(document)
        }
        .instrument(span)
        .await
    }

    /// Active documents of a policy or claim the caller may view
    pub fn list_active(&self, ctx: &RequestContext, parent: EntityRef) -> Result<Vec<Document>, DeskError> {
        let scope = self.parent_scope(parent)?;
        self.oracle.check_scoped(ctx, Action::ViewDocuments, &scope)?;

        let mut documents: Vec<Document> = self
            .store
            .documents_for(parent)?
            .into_iter()
            .filter(|d| d.state == DocumentState::Active)
            .collect();
        documents.sort_by_key(|d| d.uploaded_at);
        Ok(documents)
    }

    /// Every stored document of the parent, discarded ones included. Admin only.
    pub fn list_all(&self, ctx: &RequestContext, parent: EntityRef) -> Result<Vec<Document>, DeskError> {
        self.oracle.check(ctx, Action::ViewAllDocuments)?;
        let mut documents = self.store.documents_for(parent)?;
        documents.sort_by_key(|d| d.uploaded_at);
        Ok(documents)
    }

    /// Deletes the storage objects listed in a purge manifest. Every path is
    /// attempted; failures are collected rather than stopping the loop.
    pub async fn release_storage(&self, manifest: &PurgeManifest) -> PurgeReport {
        let mut report = PurgeReport::default();
        for path in &manifest.storage_paths {
            match self.release(path).await {
                Ok(()) => report.released.push(path.clone()),
                Err(e) => {
                    warn!(root = %manifest.root, path = %path, error = %e, "Storage object not released");
                    report.orphaned.push(path.clone());
                }
            }
        }
        if !report.is_complete() {
            desk_metrics().record_partial_failure();
        }
        report
    }
}

/// Keeps the last path component of an uploaded file name
fn sanitize_file_name(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    (!name.is_empty() && name != "." && name != "..").then(|| name.to_string())
}
