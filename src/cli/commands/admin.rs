use anyhow::Result;
use uuid::Uuid;

use super::{emit, emit_list, Session};
use crate::cli::{ActorAction, TeamAction};
use crate::entities::EntityRef;
use crate::errors::DeskError;
use crate::teams::{NewActor, TransferScope};

fn counted<T>(result: Result<Vec<T>, DeskError>) -> Result<(Vec<T>, usize), DeskError> {
    result.map(|items| {
        let count = items.len();
        (items, count)
    })
}

pub fn bootstrap(session: &Session, email: &str, name: &str) -> Result<()> {
    emit(session.desk.directory.bootstrap_admin(email, name))
}

pub fn actor(session: &Session, action: &ActorAction) -> Result<()> {
    let directory = &session.desk.directory;
    let ctx = &session.ctx;

    match action {
        ActorAction::Register {
            email,
            name,
            role,
            phone,
            team,
        } => emit(directory.register_actor(
            ctx,
            NewActor {
                email: email.clone(),
                full_name: name.clone(),
                role: *role,
                phone: phone.clone(),
                team_id: *team,
            },
        )),
        ActorAction::Role { id, role } => emit(directory.change_role(ctx, *id, *role)),
        ActorAction::Deactivate { id } => emit(directory.deactivate_actor(ctx, *id)),
        ActorAction::List => emit_list(counted(directory.list_actors(ctx))),
    }
}

pub fn team(session: &Session, action: &TeamAction) -> Result<()> {
    let directory = &session.desk.directory;
    let ctx = &session.ctx;

    match action {
        TeamAction::Create { name } => emit(directory.create_team(ctx, name)),
        TeamAction::List => emit_list(counted(directory.list_teams(ctx))),
        TeamAction::Assign { actor, team } => emit(directory.assign_to_team(ctx, *actor, *team)),
        TeamAction::Members { id } => emit_list(counted(directory.team_members(ctx, *id))),
    }
}

pub fn transfer(session: &Session, from: Uuid, to: Uuid, scope: TransferScope, ids: &[Uuid]) -> Result<()> {
    let transfers = &session.desk.transfers;
    if ids.is_empty() {
        emit(transfers.transfer_all(&session.ctx, from, to, scope))
    } else {
        emit(transfers.transfer(&session.ctx, ids, from, to, scope))
    }
}

pub fn history(session: &Session, entity: EntityRef) -> Result<()> {
    emit_list(counted(session.desk.history(&session.ctx, entity)))
}

pub fn grants(session: &Session, sweep: bool) -> Result<()> {
    if sweep {
        return emit(session.desk.sweep_expired_grants(&session.ctx));
    }
    emit_list(counted(session.desk.my_grants(&session.ctx)))
}
