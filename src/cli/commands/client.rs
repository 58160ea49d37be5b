use anyhow::Result;

use super::{emit, emit_list, Session};
use crate::cli::ClientAction;
use crate::entities::{ClientPatch, ListQuery, NewClient};

pub struct ClientCommand<'a> {
    action: &'a ClientAction,
}

impl<'a> ClientCommand<'a> {
    pub fn new(action: &'a ClientAction) -> Self {
        Self { action }
    }

    pub fn execute(&self, session: &Session) -> Result<()> {
        let entities = &session.desk.entities;
        let ctx = &session.ctx;

        match self.action {
            ClientAction::Create {
                name,
                tax_id,
                email,
                phone,
                owner,
            } => emit(entities.create_client(
                ctx,
                NewClient {
                    full_name: name.clone(),
                    tax_id: tax_id.clone(),
                    email: email.clone(),
                    phone: phone.clone(),
                    owner_id: *owner,
                },
            )),
            ClientAction::Update {
                id,
                name,
                tax_id,
                email,
                phone,
            } => emit(entities.update_client(
                ctx,
                *id,
                ClientPatch {
                    full_name: name.clone(),
                    tax_id: tax_id.clone(),
                    email: email.clone(),
                    phone: phone.clone(),
                },
            )),
            ClientAction::Show { id } => emit(entities.get_client(ctx, *id)),
            ClientAction::List(args) => emit_list(
                entities
                    .list_clients(ctx, &ListQuery::from(args))
                    .map(|page| (page.items, page.total)),
            ),
        }
    }
}
