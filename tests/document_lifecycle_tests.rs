//! Document discard/restore/delete and record purges against an object
//! store whose deletes can be made to fail.

mod fixtures;

use agency_desk::documents::{DocumentState, NewDocument};
use agency_desk::entities::EntityRef;
use agency_desk::errors::{DeskError, ErrorKind};
use agency_desk::permissions::Role;
use fixtures::Harness;

fn pdf(name: &str) -> NewDocument {
    NewDocument {
        file_name: name.to_string(),
        content_type: "application/pdf".to_string(),
        contents: b"%PDF-1.7 poliza".to_vec(),
    }
}

#[tokio::test]
async fn discard_hides_and_admin_restores() {
    let h = Harness::new();
    let ventas = h.actor("ventas@agencia.mx", Role::Comercial);
    let client = h.client(&ventas, None, None);
    let policy = h.pending_policy(&ventas, &client, "AUT-2001");
    let parent = EntityRef::Policy(policy.id);

    let doc = h.desk.documents.attach(&ventas, parent, pdf("caratula.pdf")).await.unwrap();
    assert!(h.storage.contains(&doc.storage_path));

    let discarded = h.desk.documents.discard(&ventas, doc.id).unwrap();
    assert_eq!(discarded.state, DocumentState::Discarded);
    assert!(h.desk.documents.list_active(&ventas, parent).unwrap().is_empty());

    // Discarding twice succeeds without a second audit entry
    h.desk.documents.discard(&ventas, doc.id).unwrap();
    let history = h.desk.history(&h.admin, EntityRef::Document(doc.id)).unwrap();
    assert_eq!(history.len(), 2);

    let err = h.desk.documents.restore(&ventas, doc.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let restored = h.desk.documents.restore(&h.admin, doc.id).unwrap();
    assert_eq!(restored.state, DocumentState::Active);
    assert_eq!(h.desk.documents.list_active(&ventas, parent).unwrap().len(), 1);
}

#[tokio::test]
async fn only_discarded_documents_can_be_deleted() {
    let h = Harness::new();
    let ventas = h.actor("ventas@agencia.mx", Role::Comercial);
    let client = h.client(&ventas, None, None);
    let policy = h.pending_policy(&ventas, &client, "AUT-2002");

    let doc = h
        .desk
        .documents
        .attach(&ventas, EntityRef::Policy(policy.id), pdf("ine.pdf"))
        .await
        .unwrap();

    let err = h.desk.documents.permanently_delete(&h.admin, doc.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);

    h.desk.documents.discard(&ventas, doc.id).unwrap();
    let err = h.desk.documents.permanently_delete(&ventas, doc.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let deleted = h.desk.documents.permanently_delete(&h.admin, doc.id).await.unwrap();
    assert_eq!(deleted.state, DocumentState::Deleted);
    assert!(!h.storage.contains(&doc.storage_path));
}

#[tokio::test]
async fn storage_failure_on_delete_reports_the_orphan_but_removes_the_record() {
    let h = Harness::new();
    let ventas = h.actor("ventas@agencia.mx", Role::Comercial);
    let client = h.client(&ventas, None, None);
    let policy = h.pending_policy(&ventas, &client, "AUT-2003");
    let parent = EntityRef::Policy(policy.id);

    let doc = h.desk.documents.attach(&ventas, parent, pdf("factura.pdf")).await.unwrap();
    h.desk.documents.discard(&ventas, doc.id).unwrap();
    h.storage.fail_deletes(true);

    let err = h.desk.documents.permanently_delete(&h.admin, doc.id).await.unwrap_err();
    match &err {
        DeskError::PartialFailure { orphaned, .. } => assert_eq!(orphaned, &vec![doc.storage_path.clone()]),
        other => panic!("expected a partial failure, got {other:?}"),
    }
    assert!(h.desk.documents.list_all(&h.admin, parent).unwrap().is_empty());
    assert!(h.storage.contains(&doc.storage_path));
}

#[tokio::test]
async fn policy_purge_cascades_and_reports_orphaned_files() {
    let h = Harness::new();
    let ventas = h.actor("ventas@agencia.mx", Role::Comercial);
    let siniestros = h.actor("siniestros@agencia.mx", Role::Siniestros);
    let client = h.client(&ventas, None, None);
    let policy = h.active_policy(&ventas, &client, "AUT-2004");
    let claim = h.claim(&siniestros, &policy);

    h.desk
        .documents
        .attach(&ventas, EntityRef::Policy(policy.id), pdf("poliza.pdf"))
        .await
        .unwrap();
    h.desk
        .documents
        .attach(&siniestros, EntityRef::Claim(claim.id), pdf("fotos.pdf"))
        .await
        .unwrap();
    assert_eq!(h.storage.len(), 2);
    h.storage.fail_deletes(true);

    let err = h.desk.purge_policy(&h.admin, policy.id).await.unwrap_err();
    match &err {
        DeskError::PartialFailure { orphaned, .. } => assert_eq!(orphaned.len(), 2),
        other => panic!("expected a partial failure, got {other:?}"),
    }

    assert_eq!(
        h.desk.entities.get_policy(&h.admin, policy.id).unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        h.desk.entities.get_claim(&h.admin, claim.id).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[tokio::test]
async fn claim_purge_releases_its_files() {
    let h = Harness::new();
    let ventas = h.actor("ventas@agencia.mx", Role::Comercial);
    let siniestros = h.actor("siniestros@agencia.mx", Role::Siniestros);
    let client = h.client(&ventas, None, None);
    let policy = h.active_policy(&ventas, &client, "AUT-2005");
    let claim = h.claim(&siniestros, &policy);

    let doc = h
        .desk
        .documents
        .attach(&siniestros, EntityRef::Claim(claim.id), pdf("parte.pdf"))
        .await
        .unwrap();

    let err = h.desk.purge_claim(&siniestros, claim.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let report = h.desk.purge_claim(&h.admin, claim.id).await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.released, vec![doc.storage_path.clone()]);
    assert!(!h.storage.contains(&doc.storage_path));

    // The policy survives a claim purge
    assert!(h.desk.entities.get_policy(&h.admin, policy.id).is_ok());
}
