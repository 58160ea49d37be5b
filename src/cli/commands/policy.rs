use anyhow::Result;

use super::{emit, emit_list, Session};
use crate::cli::PolicyAction;
use crate::entities::{ListQuery, NewPolicy, PolicyPatch};

pub struct PolicyCommand<'a> {
    action: &'a PolicyAction,
}

impl<'a> PolicyCommand<'a> {
    pub fn new(action: &'a PolicyAction) -> Self {
        Self { action }
    }

    pub async fn execute(&self, session: &Session) -> Result<()> {
        let desk = &session.desk;
        let ctx = &session.ctx;

        match self.action {
            PolicyAction::Create {
                number,
                client,
                line,
                insurer,
                premium,
                currency,
                valid_from,
                valid_to,
                responsible,
            } => emit(desk.entities.create_policy(
                ctx,
                NewPolicy {
                    number: number.clone(),
                    client_id: *client,
                    line_of_business: line.clone(),
                    insurer: insurer.clone(),
                    premium: *premium,
                    currency: currency.clone(),
                    valid_from: *valid_from,
                    valid_to: *valid_to,
                    responsible_id: *responsible,
                },
            )),
            PolicyAction::Update {
                id,
                number,
                line,
                insurer,
                premium,
                currency,
                valid_from,
                valid_to,
            } => emit(desk.entities.update_policy(
                ctx,
                *id,
                PolicyPatch {
                    number: number.clone(),
                    line_of_business: line.clone(),
                    insurer: insurer.clone(),
                    premium: *premium,
                    currency: currency.clone(),
                    valid_from: *valid_from,
                    valid_to: *valid_to,
                },
            )),
            PolicyAction::Approve { id, note } => emit(desk.policies.approve(ctx, *id, note.as_deref())),
            PolicyAction::Reject { id, reason } => emit(desk.reject_policy(ctx, *id, reason).await),
            PolicyAction::Resubmit { id, note } => emit(desk.policies.resubmit(ctx, *id, note.as_deref())),
            PolicyAction::Cancel { id, note } => emit(desk.policies.cancel(ctx, *id, note.as_deref())),
            PolicyAction::Renew { id, note } => emit(desk.policies.renew(ctx, *id, note.as_deref())),
            PolicyAction::Show { id } => emit(desk.entities.get_policy(ctx, *id)),
            PolicyAction::List(args) => emit_list(
                desk.entities
                    .list_policies(ctx, &ListQuery::from(args))
                    .map(|page| (page.items, page.total)),
            ),
            PolicyAction::Purge { id } => emit(desk.purge_policy(ctx, *id).await),
        }
    }
}
