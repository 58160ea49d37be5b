// Back-office facade
//
// Wires the components around one store, oracle and clock, and sequences
// the multi-step operations: mutation first, then storage release or
// notification. Side effects that fail after the mutation committed are
// reported, never rolled back.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::DeskConfig;
use crate::documents::{DocumentLifecycleManager, PurgeManifest, PurgeReport};
use crate::entities::{EntityKind, EntityRef, EntityRepository};
use crate::errors::DeskError;
use crate::notifications::{DeliveryStatus, LogChannel, Message, NotificationChannel, NotificationComposer};
use crate::observability::{desk_metrics, OperationTimer};
use crate::permissions::{Action, PermissionOracle, RequestContext, RoleBasedOracle};
use crate::storage::{LocalObjectStorage, ObjectStorage};
use crate::store::DeskStore;
use crate::teams::{ActorDirectory, TransferCoordinator};
use crate::workflows::{
    AuditRecord, AuditTrail, ClaimTransition, ClaimWorkflow, EditGrant, PolicyStateMachine, RejectionOutcome,
};

/// A committed mutation plus what happened to its notification
#[derive(Debug, Clone, Serialize)]
pub struct Notified<T> {
    pub outcome: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<DeliveryStatus>,
}

/// Record counts of the whole installation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeskSummary {
    pub actors: usize,
    pub clients: usize,
    pub policies: BTreeMap<String, usize>,
    pub open_claims: usize,
    pub closed_claims: usize,
    pub live_grants: usize,
}

pub struct BackOfficeBuilder {
    store: Arc<dyn DeskStore>,
    oracle: Option<Arc<dyn PermissionOracle>>,
    clock: Option<Arc<dyn Clock>>,
    storage: Option<Arc<dyn ObjectStorage>>,
    channel: Option<Arc<dyn NotificationChannel>>,
    config: DeskConfig,
}

impl BackOfficeBuilder {
    pub fn oracle(mut self, oracle: Arc<dyn PermissionOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn ObjectStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn channel(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn config(mut self, config: DeskConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<BackOffice, DeskError> {
        self.config.validate()?;
        let store = self.store;
        let oracle = self.oracle.unwrap_or_else(|| Arc::new(RoleBasedOracle::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(LocalObjectStorage::new(self.config.storage_root())));
        let channel = self.channel.unwrap_or_else(|| Arc::new(LogChannel));

        let statuses = Arc::new(self.config.status_catalog()?);
        let coverages = Arc::new(self.config.coverage_catalog());

        Ok(BackOffice {
            entities: EntityRepository::new(
                store.clone(),
                oracle.clone(),
                clock.clone(),
                coverages,
                statuses.clone(),
                self.config.repository_settings(),
            ),
            documents: DocumentLifecycleManager::new(
                store.clone(),
                oracle.clone(),
                clock.clone(),
                storage,
                self.config.document_settings(),
            ),
            policies: PolicyStateMachine::new(
                store.clone(),
                oracle.clone(),
                clock.clone(),
                self.config.workflow_settings(),
            ),
            claims: ClaimWorkflow::new(store.clone(), oracle.clone(), clock.clone(), statuses),
            audit: AuditTrail::new(store.clone(), oracle.clone()),
            directory: ActorDirectory::new(store.clone(), oracle.clone(), clock.clone()),
            transfers: TransferCoordinator::new(store.clone(), oracle.clone(), clock.clone()),
            composer: NotificationComposer::new(self.config.notification_settings()),
            channel,
            send_timeout: self.config.send_timeout(),
            oracle,
            store,
            clock,
        })
    }
}

pub struct BackOffice {
    pub entities: EntityRepository,
    pub documents: DocumentLifecycleManager,
    pub policies: PolicyStateMachine,
    pub claims: ClaimWorkflow,
    pub directory: ActorDirectory,
    pub transfers: TransferCoordinator,
    audit: AuditTrail,
    composer: NotificationComposer,
    channel: Arc<dyn NotificationChannel>,
    send_timeout: Duration,
    oracle: Arc<dyn PermissionOracle>,
    store: Arc<dyn DeskStore>,
    clock: Arc<dyn Clock>,
}

impl BackOffice {
    pub fn builder(store: Arc<dyn DeskStore>) -> BackOfficeBuilder {
        BackOfficeBuilder {
            store,
            oracle: None,
            clock: None,
            storage: None,
            channel: None,
            config: DeskConfig::default(),
        }
    }

    pub fn composer(&self) -> &NotificationComposer {
        &self.composer
    }

    /// Builds the request context for a login email. No email means an
    /// anonymous caller; an unknown email is rejected.
    pub fn context_for(&self, email: Option<&str>) -> Result<RequestContext, DeskError> {
        match email {
            None => Ok(RequestContext::anonymous()),
            Some(email) => self
                .directory
                .find_by_email(email)?
                .map(RequestContext::authenticated)
                .ok_or(DeskError::Unauthenticated),
        }
    }

    /// Sends under the configured timeout. Never fails the caller.
    pub async fn deliver(&self, message: &Message) -> DeliveryStatus {
        let timer = OperationTimer::new("notification.deliver");
        let status = match tokio::time::timeout(self.send_timeout, self.channel.send(message)).await {
            Ok(Ok(())) => DeliveryStatus::Sent { at: self.clock.now() },
            Ok(Err(e)) => DeliveryStatus::Failed { reason: e.to_string() },
            Err(_) => DeliveryStatus::Failed {
                reason: format!("send timed out after {} ms", self.send_timeout.as_millis()),
            },
        };
        timer.finish();
        desk_metrics().record_notification(status.is_sent());
        match &status {
            DeliveryStatus::Sent { .. } => {
                info!(channel = message.channel(), to = %message.recipient(), "Notification delivered")
            }
            other => {
                warn!(channel = message.channel(), to = %message.recipient(), status = ?other, "Notification not delivered")
            }
        }
        status
    }

    async fn deliver_composed(&self, composed: Result<Message, DeskError>) -> DeliveryStatus {
        match composed {
            Ok(message) => self.deliver(&message).await,
            Err(e) => {
                warn!(error = %e, "Notification skipped");
                desk_metrics().record_notification(false);
                DeliveryStatus::Skipped { reason: e.to_string() }
            }
        }
    }

    /// Rejects the policy, then emails its creator the reason and the
    /// edit-window deadline
    pub async fn reject_policy(
        &self,
        ctx: &RequestContext,
        policy_id: Uuid,
        reason: &str,
    ) -> Result<Notified<RejectionOutcome>, DeskError> {
        let outcome = self.policies.reject(ctx, policy_id, reason)?;

        let composed = match self.store.actor(outcome.policy.created_by)? {
            Some(creator) => self.composer.compose_rejection_notice(
                &outcome.policy,
                &creator,
                reason,
                outcome.grant.expires_at,
            ),
            None => Err(DeskError::not_found(EntityKind::Actor, outcome.policy.created_by)),
        };
        let notification = self.deliver_composed(composed).await;

        Ok(Notified {
            outcome,
            notification: Some(notification),
        })
    }

    /// Moves the claim and, when the target status closes it, notifies the client
    pub async fn transition_claim(
        &self,
        ctx: &RequestContext,
        claim_id: Uuid,
        target: &str,
        note: Option<&str>,
    ) -> Result<Notified<ClaimTransition>, DeskError> {
        let transition = self.claims.transition(ctx, claim_id, target, note)?;
        let Some(closure) = transition.closure else {
            return Ok(Notified {
                outcome: transition,
                notification: None,
            });
        };

        let policy_id = transition.claim.policy_id;
        let client = self
            .store
            .policy(policy_id)?
            .map(|p| p.client_id)
            .map(|client_id| self.store.client(client_id))
            .transpose()?
            .flatten();
        let composed = match client {
            Some(client) => self
                .composer
                .compose_closure_notice(&transition.claim, &client, closure),
            None => Err(DeskError::not_found(EntityKind::Client, policy_id)),
        };
        let notification = self.deliver_composed(composed).await;

        Ok(Notified {
            outcome: transition,
            notification: Some(notification),
        })
    }

    /// Purges the policy records, then releases their storage objects.
    /// Orphaned objects make the result a `PartialFailure`; the records
    /// stay deleted either way.
    pub async fn purge_policy(&self, ctx: &RequestContext, policy_id: Uuid) -> Result<PurgeReport, DeskError> {
        let manifest = self.entities.purge_policy(ctx, policy_id)?;
        self.release(manifest).await
    }

    pub async fn purge_claim(&self, ctx: &RequestContext, claim_id: Uuid) -> Result<PurgeReport, DeskError> {
        let manifest = self.entities.purge_claim(ctx, claim_id)?;
        self.release(manifest).await
    }

    async fn release(&self, manifest: PurgeManifest) -> Result<PurgeReport, DeskError> {
        let timer = OperationTimer::new("storage.release");
        let report = self.documents.release_storage(&manifest).await;
        timer.finish();
        if report.is_complete() {
            Ok(report)
        } else {
            Err(DeskError::PartialFailure {
                message: format!("{} was purged but some files could not be removed", manifest.root),
                orphaned: report.orphaned,
            })
        }
    }

    /// Transition history of any audited record, oldest first
    pub fn history(&self, ctx: &RequestContext, entity: EntityRef) -> Result<Vec<AuditRecord>, DeskError> {
        self.audit.history(ctx, entity)
    }

    /// Live edit grants held by the caller
    pub fn my_grants(&self, ctx: &RequestContext) -> Result<Vec<EditGrant>, DeskError> {
        let actor_id = ctx.actor_id().ok_or(DeskError::Unauthenticated)?;
        self.policies.grants().live_for_holder(actor_id)
    }

    /// Installation-wide counts. Admin only.
    pub fn summary(&self, ctx: &RequestContext) -> Result<DeskSummary, DeskError> {
        self.oracle.check(ctx, Action::ManageActors)?;
        let now = self.clock.now();
        let catalog = self.claims.catalog();

        let mut summary = DeskSummary {
            actors: self.store.actors()?.iter().filter(|a| a.active).count(),
            clients: self.store.clients()?.len(),
            live_grants: self.store.edit_grants()?.iter().filter(|g| g.is_live(now)).count(),
            ..Default::default()
        };
        for policy in self.store.policies()? {
            *summary.policies.entry(policy.status.to_string()).or_default() += 1;
        }
        for claim in self.store.claims()? {
            if catalog.is_open(&claim.status) {
                summary.open_claims += 1;
            } else {
                summary.closed_claims += 1;
            }
        }
        Ok(summary)
    }

    /// Revokes edit grants whose window has passed. Admin only.
    pub fn sweep_expired_grants(&self, ctx: &RequestContext) -> Result<usize, DeskError> {
        let actor = self.oracle.check(ctx, Action::ManageActors)?;
        let swept = self.policies.grants().sweep_expired()?;
        info!(
            correlation.id = %ctx.correlation_id(),
            actor.id = %actor.id,
            swept,
            "Edit grant sweep finished"
        );
        Ok(swept)
    }
}
