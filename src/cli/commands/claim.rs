use anyhow::Result;

use super::{emit, emit_list, print_json, Session};
use crate::cli::ClaimAction;
use crate::entities::{ClaimPatch, ListQuery, NewClaim};

pub struct ClaimCommand<'a> {
    action: &'a ClaimAction,
}

impl<'a> ClaimCommand<'a> {
    pub fn new(action: &'a ClaimAction) -> Self {
        Self { action }
    }

    pub async fn execute(&self, session: &Session) -> Result<()> {
        let desk = &session.desk;
        let ctx = &session.ctx;

        match self.action {
            ClaimAction::Create {
                policy,
                description,
                incident_date,
                coverages,
                responsible,
            } => emit(desk.entities.create_claim(
                ctx,
                NewClaim {
                    policy_id: *policy,
                    description: description.clone(),
                    incident_date: *incident_date,
                    coverages: coverages.clone(),
                    responsible_id: *responsible,
                },
            )),
            ClaimAction::Update {
                id,
                description,
                incident_date,
                coverages,
            } => emit(desk.entities.update_claim(
                ctx,
                *id,
                ClaimPatch {
                    description: description.clone(),
                    incident_date: *incident_date,
                    coverages: coverages.clone(),
                },
            )),
            ClaimAction::Transition { id, to, note } => {
                emit(desk.transition_claim(ctx, *id, to, note.as_deref()).await)
            }
            ClaimAction::Reassign { id, to } => emit(desk.entities.reassign_claim(ctx, *id, *to)),
            ClaimAction::Show { id } => emit(desk.entities.get_claim(ctx, *id)),
            ClaimAction::List(args) => emit_list(
                desk.entities
                    .list_claims(ctx, &ListQuery::from(args))
                    .map(|page| (page.items, page.total)),
            ),
            ClaimAction::Statuses => print_json(&desk.claims.catalog().statuses()),
            ClaimAction::Purge { id } => emit(desk.purge_claim(ctx, *id).await),
        }
    }
}
