//! Actor administration, ownership transfers, request contexts and the
//! snapshot round trip used by the CLI.

mod fixtures;

use std::sync::Arc;
use tempfile::TempDir;

use agency_desk::entities::{EntityKind, ListQuery};
use agency_desk::errors::{DeskError, ErrorKind};
use agency_desk::permissions::Role;
use agency_desk::results::MutationResult;
use agency_desk::teams::TransferScope;
use agency_desk::{BackOffice, InMemoryStore, SnapshotFile};
use fixtures::Harness;

#[tokio::test]
async fn the_last_admin_cannot_demote_themselves() {
    let h = Harness::new();
    let admin_id = h.admin.actor_id().unwrap();

    let err = h.desk.directory.change_role(&h.admin, admin_id, Role::Comercial).unwrap_err();
    assert!(matches!(err, DeskError::LastAdmin { .. }));
    assert_eq!(err.code(), "last_admin");

    let result = MutationResult::from_result(h.desk.directory.deactivate_actor(&h.admin, admin_id)).unwrap();
    assert!(!result.is_success());
    assert_eq!(result.error_kind(), Some("last_admin"));
}

#[tokio::test]
async fn non_admins_cannot_transfer_and_nothing_moves() {
    let h = Harness::new();
    let ventas = h.actor("ventas@agencia.mx", Role::Comercial);
    let usuario = h.actor("usuario@agencia.mx", Role::Usuario);
    let client = h.client(&ventas, None, None);
    let policy = h.pending_policy(&ventas, &client, "AUT-4001");

    let err = h
        .desk
        .transfers
        .transfer(
            &usuario,
            &[policy.id, client.id],
            ventas.actor_id().unwrap(),
            usuario.actor_id().unwrap(),
            TransferScope::Both,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let unchanged = h.desk.entities.get_policy(&h.admin, policy.id).unwrap();
    assert_eq!(unchanged.responsible_id, ventas.actor_id().unwrap());
}

#[tokio::test]
async fn transfers_move_what_the_source_owns_and_report_the_rest() {
    let h = Harness::new();
    let ventas = h.actor("ventas@agencia.mx", Role::Comercial);
    let relevo = h.actor("relevo@agencia.mx", Role::Comercial);
    let client = h.client(&ventas, None, None);
    let policy = h.pending_policy(&ventas, &client, "AUT-4002");
    let stranger = uuid::Uuid::new_v4();

    let report = h
        .desk
        .transfers
        .transfer(
            &h.admin,
            &[policy.id, client.id, stranger],
            ventas.actor_id().unwrap(),
            relevo.actor_id().unwrap(),
            TransferScope::Both,
        )
        .unwrap();
    assert_eq!(report.moved, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].id, stranger);

    let moved = h.desk.entities.get_policy(&h.admin, policy.id).unwrap();
    assert_eq!(moved.responsible_id, relevo.actor_id().unwrap());
    let listed = h
        .desk
        .entities
        .list_policies(&h.admin, &ListQuery::default().with_owner(relevo.actor_id().unwrap()))
        .unwrap();
    assert_eq!(listed.total, 1);
}

#[tokio::test]
async fn owner_scoped_roles_only_see_their_team() {
    let h = Harness::new();
    let norte = h.desk.directory.create_team(&h.admin, "Norte").unwrap();
    let agente = h.actor("agente@agencia.mx", Role::Agente);
    let companero = h.actor("companero@agencia.mx", Role::Agente);
    let ajeno = h.actor("ajeno@agencia.mx", Role::Agente);
    for ctx in [&agente, &companero] {
        h.desk
            .directory
            .assign_to_team(&h.admin, ctx.actor_id().unwrap(), Some(norte.id))
            .unwrap();
    }

    let client = h.client(&agente, None, None);
    let companero = h.desk.context_for(Some("companero@agencia.mx")).unwrap();
    assert!(h.desk.entities.get_client(&companero, client.id).is_ok());

    let err = h.desk.entities.get_client(&ajeno, client.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    let visible = h.desk.entities.list_clients(&ajeno, &ListQuery::default()).unwrap();
    assert_eq!(visible.total, 0);
}

#[tokio::test]
async fn unknown_emails_do_not_get_a_context() {
    let h = Harness::new();
    assert!(matches!(
        h.desk.context_for(Some("nadie@agencia.mx")),
        Err(DeskError::Unauthenticated)
    ));

    let anonymous = h.desk.context_for(None).unwrap();
    let err = h.desk.entities.list_clients(&anonymous, &ListQuery::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthenticated);
}

#[tokio::test]
async fn store_outages_escape_the_value_objects() {
    let h = Harness::new();
    let ventas = h.actor("ventas@agencia.mx", Role::Comercial);
    let client = h.client(&ventas, None, None);
    h.store.set_offline(true);

    let result = MutationResult::from_result(h.desk.entities.get_client(&ventas, client.id));
    assert!(matches!(result, Err(DeskError::Store(_))));
}

#[tokio::test]
async fn snapshots_carry_the_store_between_runs() {
    let dir = TempDir::new().unwrap();
    let snapshot = SnapshotFile::new(dir.path().join("state.json"));

    let h = Harness::new();
    let ventas = h.actor("ventas@agencia.mx", Role::Comercial);
    let client = h.client(&ventas, Some("5512345678"), None);
    snapshot.save(&h.store.snapshot().unwrap()).await.unwrap();

    let reloaded = Arc::new(InMemoryStore::from_state(snapshot.load().await.unwrap()));
    let desk = BackOffice::builder(reloaded).build().unwrap();
    let ctx = desk.context_for(Some("ventas@agencia.mx")).unwrap();
    let again = desk.entities.get_client(&ctx, client.id).unwrap();
    assert_eq!(again.phone.as_deref(), Some("5512345678"));

    let missing = desk.entities.get_client(&ctx, uuid::Uuid::new_v4()).unwrap_err();
    assert!(matches!(missing, DeskError::NotFound { kind: EntityKind::Client, .. }));
}

#[tokio::test]
async fn the_summary_counts_records_for_admins_only() {
    let h = Harness::new();
    let ventas = h.actor("ventas@agencia.mx", Role::Comercial);
    let siniestros = h.actor("siniestros@agencia.mx", Role::Siniestros);
    let client = h.client(&ventas, None, Some("maria@correo.mx"));
    h.pending_policy(&ventas, &client, "AUT-4003");
    let active = h.active_policy(&ventas, &client, "AUT-4004");
    let open = h.claim(&siniestros, &active);
    let closed = h.claim(&siniestros, &active);
    h.desk
        .transition_claim(&siniestros, closed.id, "desistido", None)
        .await
        .unwrap();

    let err = h.desk.summary(&ventas).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let summary = h.desk.summary(&h.admin).unwrap();
    assert_eq!(summary.actors, 3);
    assert_eq!(summary.clients, 1);
    assert_eq!(summary.policies.get("pending"), Some(&1));
    assert_eq!(summary.policies.get("active"), Some(&1));
    assert_eq!(summary.open_claims, 1);
    assert_eq!(summary.closed_claims, 1);
    assert_eq!(summary.live_grants, 0);
    assert_eq!(open.status, "abierto");
}
