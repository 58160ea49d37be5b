// Entity repository - permission-checked CRUD over clients, policies, claims
//
// Every mutation asks the oracle first, validates the full candidate record,
// and only then writes. Nothing is saved on denial or validation failure.

use chrono::{Datelike, Duration};
use regex::Regex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info};
use uuid::Uuid;

use super::catalog::CoverageCatalog;
use super::query::{paginate, ListQuery, Page};
use super::types::is_valid_email;
use super::types::{
    non_empty, Claim, ClaimPatch, Client, ClientPatch, EntityKind, EntityRef, NewClaim, NewClient,
    NewPolicy, Policy, PolicyPatch,
};
use crate::clock::Clock;
use crate::documents::PurgeManifest;
use crate::errors::DeskError;
use crate::permissions::{Action, Actor, Ownership, PermissionOracle, RequestContext};
use crate::store::DeskStore;
use crate::telemetry::create_operation_span;
use crate::workflows::state_machine::apply_resubmission;
use crate::workflows::{AuditTrail, ClaimStatusCatalog, EditEffect, EditGrantLedger, PolicyStatus};

static CURRENCY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{3}$").expect("currency pattern is valid"));

#[derive(Debug, Clone, Copy)]
pub struct RepositorySettings {
    /// Days after the incident during which a claim may be filed
    pub filing_window_days: i64,
    pub max_page_size: usize,
}

impl Default for RepositorySettings {
    fn default() -> Self {
        Self {
            filing_window_days: 60,
            max_page_size: 100,
        }
    }
}

/// Owner id -> owner's team, loaded once per listing call
struct OwnerTeams(HashMap<Uuid, Option<Uuid>>);

impl OwnerTeams {
    fn ownership(&self, owner_id: Uuid) -> Ownership {
        Ownership::new(owner_id, self.0.get(&owner_id).copied().flatten())
    }
}

#[derive(Clone)]
pub struct EntityRepository {
    store: Arc<dyn DeskStore>,
    oracle: Arc<dyn PermissionOracle>,
    clock: Arc<dyn Clock>,
    grants: EditGrantLedger,
    audit: AuditTrail,
    coverages: Arc<CoverageCatalog>,
    claim_statuses: Arc<ClaimStatusCatalog>,
    settings: RepositorySettings,
}

impl EntityRepository {
    pub fn new(
        store: Arc<dyn DeskStore>,
        oracle: Arc<dyn PermissionOracle>,
        clock: Arc<dyn Clock>,
        coverages: Arc<CoverageCatalog>,
        claim_statuses: Arc<ClaimStatusCatalog>,
        settings: RepositorySettings,
    ) -> Self {
        Self {
            grants: EditGrantLedger::new(store.clone(), clock.clone()),
            audit: AuditTrail::new(store.clone(), oracle.clone()),
            store,
            oracle,
            clock,
            coverages,
            claim_statuses,
            settings,
        }
    }

    pub fn settings(&self) -> &RepositorySettings {
        &self.settings
    }

    fn ownership(&self, owner_id: Uuid) -> Result<Ownership, DeskError> {
        Ok(super::ownership(self.store.as_ref(), owner_id)?)
    }

    fn owner_teams(&self) -> Result<OwnerTeams, DeskError> {
        Ok(OwnerTeams(
            self.store
                .actors()?
                .into_iter()
                .map(|a| (a.id, a.team_id))
                .collect(),
        ))
    }

    fn active_actor(&self, id: Uuid) -> Result<Actor, DeskError> {
        match self.store.actor(id)? {
            Some(actor) if actor.active => Ok(actor),
            Some(_) => Err(DeskError::validation(format!("actor {id} is deactivated"))),
            None => Err(DeskError::not_found(EntityKind::Actor, id)),
        }
    }

    fn load_client(&self, id: Uuid) -> Result<Client, DeskError> {
        self.store
            .client(id)?
            .ok_or_else(|| DeskError::not_found(EntityKind::Client, id))
    }

    fn load_policy(&self, id: Uuid) -> Result<Policy, DeskError> {
        self.store
            .policy(id)?
            .ok_or_else(|| DeskError::not_found(EntityKind::Policy, id))
    }

    fn load_claim(&self, id: Uuid) -> Result<Claim, DeskError> {
        self.store
            .claim(id)?
            .ok_or_else(|| DeskError::not_found(EntityKind::Claim, id))
    }

    // ---- clients ----

    pub fn create_client(&self, ctx: &RequestContext, new: NewClient) -> Result<Client, DeskError> {
        let actor = self.oracle.check(ctx, Action::ManageClients)?;
        let owner_id = match new.owner_id {
            Some(owner) => self.active_actor(owner)?.id,
            None => actor.id,
        };

        let now = self.clock.now();
        let client = Client {
            id: Uuid::new_v4(),
            full_name: new.full_name.trim().to_string(),
            tax_id: new.tax_id.trim().to_uppercase(),
            email: new.email.as_deref().and_then(non_empty).map(|e| e.to_lowercase()),
            phone: new.phone.as_deref().and_then(non_empty),
            owner_id,
            created_at: now,
            updated_at: now,
        };
        validate_client(&client)?;

        self.store.save_client(&client)?;
        info!(
            correlation.id = %ctx.correlation_id(),
            client.id = %client.id,
            owner.id = %client.owner_id,
            "Client created"
        );
        Ok(client)
    }

    pub fn update_client(&self, ctx: &RequestContext, id: Uuid, patch: ClientPatch) -> Result<Client, DeskError> {
        let mut client = self.load_client(id)?;
        let scope = self.ownership(client.owner_id)?;
        self.oracle.check_scoped(ctx, Action::ManageClients, &scope)?;
        if patch.is_empty() {
            return Err(DeskError::validation("nothing to update"));
        }

        patch.apply(&mut client);
        client.updated_at = self.clock.now();
        validate_client(&client)?;

        self.store.save_client(&client)?;
        debug!(client.id = %client.id, "Client updated");
        Ok(client)
    }

    pub fn get_client(&self, ctx: &RequestContext, id: Uuid) -> Result<Client, DeskError> {
        let client = self.load_client(id)?;
        let scope = self.ownership(client.owner_id)?;
        self.oracle.check_scoped(ctx, Action::ViewClients, &scope)?;
        Ok(client)
    }

    pub fn list_clients(&self, ctx: &RequestContext, query: &ListQuery) -> Result<Page<Client>, DeskError> {
        self.oracle.check(ctx, Action::ViewClients)?;
        let teams = self.owner_teams()?;

        let mut matching: Vec<Client> = self
            .store
            .clients()?
            .into_iter()
            .filter(|c| {
                let email = c.email.as_deref().unwrap_or_default();
                query.matches_search(&[&c.full_name, &c.tax_id, email])
                    && query.matches_owner(c.owner_id)
                    && self.visible(ctx, Action::ViewClients, &teams, c.owner_id)
            })
            .collect();
        matching.sort_by(|a, b| a.full_name.to_lowercase().cmp(&b.full_name.to_lowercase()));

        Ok(paginate(matching, query, self.settings.max_page_size))
    }

    fn visible(&self, ctx: &RequestContext, action: Action, teams: &OwnerTeams, owner_id: Uuid) -> bool {
        self.oracle
            .evaluate(ctx, action, Some(&teams.ownership(owner_id)))
            .is_allowed()
    }

    // ---- policies ----

    pub fn create_policy(&self, ctx: &RequestContext, new: NewPolicy) -> Result<Policy, DeskError> {
        let span = create_operation_span("policy.create", ctx.correlation_id());
        let _guard = span.enter();

        let client = self.load_client(new.client_id)?;
        let scope = self.ownership(client.owner_id)?;
        let actor = self.oracle.check_scoped(ctx, Action::CreatePolicy, &scope)?;
        let responsible_id = match new.responsible_id {
            Some(responsible) => self.active_actor(responsible)?.id,
            None => actor.id,
        };

        let now = self.clock.now();
        let policy = Policy {
            id: Uuid::new_v4(),
            number: new.number.trim().to_string(),
            client_id: client.id,
            line_of_business: new.line_of_business.trim().to_lowercase(),
            insurer: new.insurer.trim().to_string(),
            status: PolicyStatus::Pending,
            responsible_id,
            created_by: actor.id,
            premium: new.premium,
            currency: new.currency.trim().to_uppercase(),
            valid_from: new.valid_from,
            valid_to: new.valid_to,
            validation: None,
            rejection: None,
            created_at: now,
            updated_at: now,
        };
        self.validate_policy(&policy)?;

        self.store.save_policy(&policy)?;
        self.audit
            .record(policy.entity_ref(), actor.id, now, "new", policy.status.as_str(), None)?;
        info!(
            correlation.id = %ctx.correlation_id(),
            policy.id = %policy.id,
            policy.number = %policy.number,
            "Policy created"
        );
        Ok(policy)
    }

    /// Field edit. Status side effects follow `PolicyStatus::edit_effect`:
    /// active policies drop back to pending, rejected ones need the
    /// creator's live edit grant and are re-submitted.
    pub fn update_policy(&self, ctx: &RequestContext, id: Uuid, patch: PolicyPatch) -> Result<Policy, DeskError> {
        let span = create_operation_span("policy.update", ctx.correlation_id());
        let _guard = span.enter();

        let mut policy = self.load_policy(id)?;
        let scope = self.ownership(policy.responsible_id)?;
        let actor = self.oracle.check_scoped(ctx, Action::EditPolicy, &scope)?;
        if patch.is_empty() {
            return Err(DeskError::validation("nothing to update"));
        }

        let from = policy.status;
        let now = self.clock.now();
        let grant = match from.edit_effect() {
            EditEffect::Frozen => {
                return Err(DeskError::invalid_transition(
                    policy.entity_ref(),
                    from.as_str(),
                    from.as_str(),
                    "policy can no longer be edited",
                ))
            }
            EditEffect::RequiresGrant => Some(self.grants.authorize(ctx, policy.entity_ref())?),
            EditEffect::InPlace | EditEffect::ResetToPending => None,
        };

        patch.apply(&mut policy);
        policy.updated_at = now;
        self.validate_policy(&policy)?;

        match from.edit_effect() {
            EditEffect::ResetToPending => {
                policy.status = PolicyStatus::Pending;
                policy.clear_validation();
            }
            EditEffect::RequiresGrant => apply_resubmission(&mut policy, now),
            EditEffect::InPlace | EditEffect::Frozen => {}
        }

        self.store.save_policy(&policy)?;
        if policy.status != from {
            let note = match from {
                PolicyStatus::Active => "edited after validation",
                _ => "edited and re-submitted",
            };
            self.audit
                .record(policy.entity_ref(), actor.id, now, from.as_str(), policy.status.as_str(), Some(note))?;
        }
        if let Some(grant) = grant {
            self.grants.revoke(&grant)?;
        }

        info!(
            correlation.id = %ctx.correlation_id(),
            policy.id = %policy.id,
            from = %from,
            to = %policy.status,
            "Policy updated"
        );
        Ok(policy)
    }

    pub fn get_policy(&self, ctx: &RequestContext, id: Uuid) -> Result<Policy, DeskError> {
        let policy = self.load_policy(id)?;
        let scope = self.ownership(policy.responsible_id)?;
        self.oracle.check_scoped(ctx, Action::ViewPolicies, &scope)?;
        Ok(policy)
    }

    pub fn list_policies(&self, ctx: &RequestContext, query: &ListQuery) -> Result<Page<Policy>, DeskError> {
        self.oracle.check(ctx, Action::ViewPolicies)?;
        let teams = self.owner_teams()?;

        let mut matching: Vec<Policy> = self
            .store
            .policies()?
            .into_iter()
            .filter(|p| {
                query.matches_search(&[&p.number, &p.insurer, &p.line_of_business])
                    && query.matches_status(p.status.as_str())
                    && query.matches_owner(p.responsible_id)
                    && self.visible(ctx, Action::ViewPolicies, &teams, p.responsible_id)
            })
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(paginate(matching, query, self.settings.max_page_size))
    }

    fn validate_policy(&self, policy: &Policy) -> Result<(), DeskError> {
        if policy.number.is_empty() {
            return Err(DeskError::validation("policy number is required"));
        }
        if policy.insurer.is_empty() {
            return Err(DeskError::validation("insurer is required"));
        }
        if policy.line_of_business.is_empty() {
            return Err(DeskError::validation("line of business is required"));
        }
        if policy.premium <= Decimal::ZERO {
            return Err(DeskError::validation("premium must be positive"));
        }
        if !CURRENCY_PATTERN.is_match(&policy.currency) {
            return Err(DeskError::validation(format!(
                "currency '{}' is not a three-letter code",
                policy.currency
            )));
        }
        if policy.valid_to <= policy.valid_from {
            return Err(DeskError::validation("validity must end after it starts"));
        }
        super::ensure_unique_number(self.store.as_ref(), policy)
    }

    // ---- claims ----

    pub fn create_claim(&self, ctx: &RequestContext, new: NewClaim) -> Result<Claim, DeskError> {
        let span = create_operation_span("claim.create", ctx.correlation_id());
        let _guard = span.enter();

        let policy = self.load_policy(new.policy_id)?;
        let scope = self.ownership(policy.responsible_id)?;
        let actor = self.oracle.check_scoped(ctx, Action::CreateClaim, &scope)?;

        if policy.status != PolicyStatus::Active {
            return Err(DeskError::validation(format!(
                "claims can only be filed against active policies (policy {} is {})",
                policy.number, policy.status
            )));
        }

        let now = self.clock.now();
        let today = now.date_naive();
        if new.incident_date > today {
            return Err(DeskError::validation("incident date is in the future"));
        }
        if today - new.incident_date > Duration::days(self.settings.filing_window_days) {
            return Err(DeskError::validation(format!(
                "claims must be filed within {} days of the incident",
                self.settings.filing_window_days
            )));
        }

        let initial = self
            .claim_statuses
            .initial()
            .ok_or_else(|| DeskError::validation("claim status catalog has no initial status"))?;
        let responsible_id = match new.responsible_id {
            Some(responsible) => self.active_actor(responsible)?.id,
            None => actor.id,
        };

        let claim = Claim {
            id: Uuid::new_v4(),
            number: self.next_claim_number(now.year())?,
            policy_id: policy.id,
            status: initial.code.clone(),
            responsible_id,
            created_by: actor.id,
            description: new.description.trim().to_string(),
            incident_date: new.incident_date,
            coverages: normalize_codes(&new.coverages),
            closed_at: None,
            created_at: now,
            updated_at: now,
        };
        self.validate_claim(&claim, &policy)?;

        self.store.save_claim(&claim)?;
        self.audit
            .record(claim.entity_ref(), actor.id, now, "new", &claim.status, None)?;
        info!(
            correlation.id = %ctx.correlation_id(),
            claim.id = %claim.id,
            claim.number = %claim.number,
            policy.id = %policy.id,
            "Claim created"
        );
        Ok(claim)
    }

    /// Field edit, allowed only while the claim status is open-class
    pub fn update_claim(&self, ctx: &RequestContext, id: Uuid, patch: ClaimPatch) -> Result<Claim, DeskError> {
        let mut claim = self.load_claim(id)?;
        let scope = self.ownership(claim.responsible_id)?;
        self.oracle.check_scoped(ctx, Action::EditClaim, &scope)?;
        if patch.is_empty() {
            return Err(DeskError::validation("nothing to update"));
        }
        if !self.claim_statuses.is_open(&claim.status) {
            return Err(DeskError::invalid_transition(
                claim.entity_ref(),
                claim.status.as_str(),
                claim.status.as_str(),
                "closed claims cannot be edited",
            ));
        }

        let policy = self.load_policy(claim.policy_id)?;
        if let Some(description) = &patch.description {
            claim.description = description.trim().to_string();
        }
        if let Some(incident_date) = patch.incident_date {
            if incident_date > self.clock.now().date_naive() {
                return Err(DeskError::validation("incident date is in the future"));
            }
            claim.incident_date = incident_date;
        }
        if let Some(coverages) = &patch.coverages {
            claim.coverages = normalize_codes(coverages);
        }
        claim.updated_at = self.clock.now();
        self.validate_claim(&claim, &policy)?;

        self.store.save_claim(&claim)?;
        debug!(claim.id = %claim.id, "Claim updated");
        Ok(claim)
    }

    pub fn reassign_claim(&self, ctx: &RequestContext, id: Uuid, responsible_id: Uuid) -> Result<Claim, DeskError> {
        let mut claim = self.load_claim(id)?;
        let scope = self.ownership(claim.responsible_id)?;
        self.oracle.check_scoped(ctx, Action::ReassignClaim, &scope)?;
        let responsible = self.active_actor(responsible_id)?;

        let previous = claim.responsible_id;
        claim.responsible_id = responsible.id;
        claim.updated_at = self.clock.now();
        self.store.save_claim(&claim)?;

        info!(
            correlation.id = %ctx.correlation_id(),
            claim.id = %claim.id,
            from = %previous,
            to = %responsible.id,
            "Claim reassigned"
        );
        Ok(claim)
    }

    pub fn get_claim(&self, ctx: &RequestContext, id: Uuid) -> Result<Claim, DeskError> {
        let claim = self.load_claim(id)?;
        let scope = self.ownership(claim.responsible_id)?;
        self.oracle.check_scoped(ctx, Action::ViewClaims, &scope)?;
        Ok(claim)
    }

    pub fn list_claims(&self, ctx: &RequestContext, query: &ListQuery) -> Result<Page<Claim>, DeskError> {
        self.oracle.check(ctx, Action::ViewClaims)?;
        let teams = self.owner_teams()?;

        let mut matching: Vec<Claim> = self
            .store
            .claims()?
            .into_iter()
            .filter(|c| {
                query.matches_search(&[&c.number, &c.description])
                    && query.matches_status(&c.status)
                    && query.matches_owner(c.responsible_id)
                    && self.visible(ctx, Action::ViewClaims, &teams, c.responsible_id)
            })
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(paginate(matching, query, self.settings.max_page_size))
    }

    fn next_claim_number(&self, year: i32) -> Result<String, DeskError> {
        let prefix = format!("SIN-{year}-");
        let last = self
            .store
            .claims()?
            .iter()
            .filter_map(|c| c.number.strip_prefix(&prefix))
            .filter_map(|n| n.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        Ok(format!("{prefix}{:05}", last + 1))
    }

    fn validate_claim(&self, claim: &Claim, policy: &Policy) -> Result<(), DeskError> {
        if claim.description.is_empty() {
            return Err(DeskError::validation("claim description is required"));
        }
        if claim.coverages.is_empty() {
            return Err(DeskError::validation("select at least one coverage"));
        }
        let unknown = self
            .coverages
            .unknown_codes(&policy.line_of_business, &claim.coverages);
        if !unknown.is_empty() {
            return Err(DeskError::validation(format!(
                "coverages not offered for line '{}': {}",
                policy.line_of_business,
                unknown.join(", ")
            )));
        }
        Ok(())
    }

    // ---- purge ----

    /// Removes a policy, its claims and every attached document record.
    /// Storage objects are listed in the manifest for the caller to release.
    pub fn purge_policy(&self, ctx: &RequestContext, id: Uuid) -> Result<PurgeManifest, DeskError> {
        let span = create_operation_span("policy.purge", ctx.correlation_id());
        let _guard = span.enter();

        self.require_admin(ctx, Action::PurgeRecords)?;
        let policy = self.load_policy(id)?;

        let mut manifest = PurgeManifest::new(policy.entity_ref());
        for claim in self.store.claims()?.into_iter().filter(|c| c.policy_id == id) {
            self.remove_documents(claim.entity_ref(), &mut manifest)?;
            self.store.remove_claim(claim.id)?;
            manifest.removed_records.push(claim.entity_ref());
        }
        self.remove_documents(policy.entity_ref(), &mut manifest)?;
        self.store.remove_policy(policy.id)?;
        manifest.removed_records.push(policy.entity_ref());

        info!(
            correlation.id = %ctx.correlation_id(),
            policy.id = %policy.id,
            records = manifest.removed_records.len(),
            storage_objects = manifest.storage_paths.len(),
            "Policy purged"
        );
        Ok(manifest)
    }

    pub fn purge_claim(&self, ctx: &RequestContext, id: Uuid) -> Result<PurgeManifest, DeskError> {
        let span = create_operation_span("claim.purge", ctx.correlation_id());
        let _guard = span.enter();

        self.require_admin(ctx, Action::PurgeRecords)?;
        let claim = self.load_claim(id)?;

        let mut manifest = PurgeManifest::new(claim.entity_ref());
        self.remove_documents(claim.entity_ref(), &mut manifest)?;
        self.store.remove_claim(claim.id)?;
        manifest.removed_records.push(claim.entity_ref());

        info!(
            correlation.id = %ctx.correlation_id(),
            claim.id = %claim.id,
            storage_objects = manifest.storage_paths.len(),
            "Claim purged"
        );
        Ok(manifest)
    }

    fn require_admin(&self, ctx: &RequestContext, action: Action) -> Result<(), DeskError> {
        self.oracle.check(ctx, action)?;
        if !ctx.is_admin() {
            return Err(DeskError::PermissionDenied {
                action,
                reason: "admin only".to_string(),
            });
        }
        Ok(())
    }

    fn remove_documents(&self, parent: EntityRef, manifest: &mut PurgeManifest) -> Result<(), DeskError> {
        for document in self.store.documents_for(parent)? {
            self.store.remove_document(document.id)?;
            manifest.removed_records.push(document.entity_ref());
            manifest.storage_paths.push(document.storage_path);
        }
        Ok(())
    }
}

fn validate_client(client: &Client) -> Result<(), DeskError> {
    if client.full_name.is_empty() {
        return Err(DeskError::validation("client name is required"));
    }
    if client.tax_id.is_empty() {
        return Err(DeskError::validation("client tax id is required"));
    }
    if let Some(email) = &client.email {
        if !is_valid_email(email) {
            return Err(DeskError::validation(format!("'{email}' is not a valid email")));
        }
    }
    Ok(())
}

fn normalize_codes(codes: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = codes
        .iter()
        .filter_map(|c| non_empty(c))
        .map(|c| c.to_lowercase())
        .collect();
    normalized.sort();
    normalized.dedup();
    normalized
}
