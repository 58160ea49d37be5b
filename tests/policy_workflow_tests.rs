//! Policy validation workflow: edits, rejection, edit grants and the
//! rejection notice, driven through the back-office facade.

mod fixtures;

use chrono::Duration;
use rust_decimal::Decimal;

use agency_desk::entities::{EntityRef, PolicyPatch};
use agency_desk::errors::{DeskError, ErrorKind};
use agency_desk::notifications::{DeliveryStatus, Message};
use agency_desk::permissions::Role;
use agency_desk::workflows::PolicyStatus;
use fixtures::Harness;

fn premium_patch(cents: i64) -> PolicyPatch {
    PolicyPatch {
        premium: Some(Decimal::new(cents, 2)),
        ..Default::default()
    }
}

#[tokio::test]
async fn editing_an_active_policy_sends_it_back_to_validation() {
    let h = Harness::new();
    let ventas = h.actor("ventas@agencia.mx", Role::Comercial);
    let client = h.client(&ventas, None, None);
    let policy = h.active_policy(&ventas, &client, "AUT-1001");
    assert!(policy.validation.is_some());

    let edited = h
        .desk
        .entities
        .update_policy(&ventas, policy.id, premium_patch(1300000))
        .unwrap();
    assert_eq!(edited.status, PolicyStatus::Pending);
    assert!(edited.validation.is_none());

    // A pending policy is edited in place; no second transition is recorded
    let again = h
        .desk
        .entities
        .update_policy(&ventas, policy.id, premium_patch(1350000))
        .unwrap();
    assert_eq!(again.status, PolicyStatus::Pending);

    let history = h.desk.history(&h.admin, EntityRef::Policy(policy.id)).unwrap();
    let steps: Vec<(&str, &str)> = history
        .iter()
        .map(|r| (r.from_state.as_str(), r.to_state.as_str()))
        .collect();
    assert_eq!(steps, vec![("new", "pending"), ("pending", "active"), ("active", "pending")]);
}

#[tokio::test]
async fn short_rejection_reasons_are_refused() {
    let h = Harness::new();
    let ventas = h.actor("ventas@agencia.mx", Role::Comercial);
    let client = h.client(&ventas, None, None);
    let policy = h.pending_policy(&ventas, &client, "AUT-1002");

    let err = h
        .desk
        .reject_policy(&h.admin, policy.id, "  falta  ")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);

    let unchanged = h.desk.entities.get_policy(&h.admin, policy.id).unwrap();
    assert_eq!(unchanged.status, PolicyStatus::Pending);
    assert!(h.channel.sent().is_empty());
}

#[tokio::test]
async fn rejection_issues_a_day_long_grant_and_emails_the_creator() {
    let h = Harness::new();
    let ventas = h.actor("ventas@agencia.mx", Role::Comercial);
    let client = h.client(&ventas, None, None);
    let policy = h.pending_policy(&ventas, &client, "AUT-1003");

    let notified = h
        .desk
        .reject_policy(&h.admin, policy.id, "Falta la copia de la factura del vehículo")
        .await
        .unwrap();

    let outcome = &notified.outcome;
    assert_eq!(outcome.policy.status, PolicyStatus::Rejected);
    assert_eq!(outcome.grant.holder_id, ventas.actor_id().unwrap());
    assert_eq!(outcome.grant.expires_at, fixtures::start_instant() + Duration::hours(24));
    assert!(matches!(notified.notification, Some(DeliveryStatus::Sent { .. })));

    let sent = h.channel.sent();
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        Message::Email { to, subject, body } => {
            assert_eq!(to, "ventas@agencia.mx");
            assert!(subject.contains("AUT-1003"));
            assert!(body.contains("Falta la copia de la factura"));
        }
        other => panic!("expected an email, got {other:?}"),
    }

    let grants = h.desk.my_grants(&ventas).unwrap();
    assert_eq!(grants.len(), 1);
}

#[tokio::test]
async fn creator_may_edit_until_the_last_second_of_the_window() {
    let h = Harness::new();
    let ventas = h.actor("ventas@agencia.mx", Role::Comercial);
    let client = h.client(&ventas, None, None);
    let policy = h.pending_policy(&ventas, &client, "AUT-1004");

    let outcome = h
        .desk
        .reject_policy(&h.admin, policy.id, "La prima no coincide con la cotización")
        .await
        .unwrap()
        .outcome;

    h.clock.set(outcome.grant.expires_at - Duration::seconds(1));
    let resubmitted = h
        .desk
        .entities
        .update_policy(&ventas, policy.id, premium_patch(1100000))
        .unwrap();
    assert_eq!(resubmitted.status, PolicyStatus::Pending);
    assert!(resubmitted.rejection.is_none());

    // The grant is consumed by the re-submission
    assert!(h.desk.my_grants(&ventas).unwrap().is_empty());
}

#[tokio::test]
async fn edits_after_the_window_fail_with_an_expired_window() {
    let h = Harness::new();
    let ventas = h.actor("ventas@agencia.mx", Role::Comercial);
    let client = h.client(&ventas, None, None);
    let policy = h.pending_policy(&ventas, &client, "AUT-1005");

    let outcome = h
        .desk
        .reject_policy(&h.admin, policy.id, "La prima no coincide con la cotización")
        .await
        .unwrap()
        .outcome;

    h.clock.set(outcome.grant.expires_at + Duration::seconds(1));
    let err = h
        .desk
        .entities
        .update_policy(&ventas, policy.id, premium_patch(1100000))
        .unwrap_err();
    assert!(matches!(err, DeskError::EditWindowExpired { .. }));
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    assert_eq!(err.code(), "edit_window_expired");

    // Admins are bound by the same expiry
    let err = h.desk.policies.resubmit(&h.admin, policy.id, None).unwrap_err();
    assert!(matches!(err, DeskError::EditWindowExpired { .. }));

    let still = h.desk.entities.get_policy(&h.admin, policy.id).unwrap();
    assert_eq!(still.status, PolicyStatus::Rejected);
}

#[tokio::test]
async fn only_the_grant_holder_or_an_admin_may_leave_rejected() {
    let h = Harness::new();
    let ventas = h.actor("ventas@agencia.mx", Role::Comercial);
    let colega = h.actor("colega@agencia.mx", Role::Comercial);
    let client = h.client(&ventas, None, None);
    let policy = h.pending_policy(&ventas, &client, "AUT-1006");

    h.desk
        .reject_policy(&h.admin, policy.id, "Falta la identificación del asegurado")
        .await
        .unwrap();

    let err = h
        .desk
        .entities
        .update_policy(&colega, policy.id, premium_patch(900000))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let policy = h.desk.policies.resubmit(&h.admin, policy.id, Some("corregida")).unwrap();
    assert_eq!(policy.status, PolicyStatus::Pending);
}

#[tokio::test]
async fn a_failed_notice_does_not_undo_the_rejection() {
    let h = Harness::new();
    let ventas = h.actor("ventas@agencia.mx", Role::Comercial);
    let client = h.client(&ventas, None, None);
    let policy = h.pending_policy(&ventas, &client, "AUT-1007");
    h.channel.reject_all(true);

    let notified = h
        .desk
        .reject_policy(&h.admin, policy.id, "Documentación ilegible, favor de reenviar")
        .await
        .unwrap();
    assert!(matches!(notified.notification, Some(DeliveryStatus::Failed { .. })));

    let stored = h.desk.entities.get_policy(&h.admin, policy.id).unwrap();
    assert_eq!(stored.status, PolicyStatus::Rejected);
}

#[tokio::test]
async fn frozen_policies_reject_edits() {
    let h = Harness::new();
    let ventas = h.actor("ventas@agencia.mx", Role::Comercial);
    let client = h.client(&ventas, None, None);
    let policy = h.active_policy(&ventas, &client, "AUT-1008");

    let renewal = h.desk.policies.renew(&ventas, policy.id, None).unwrap();
    assert_eq!(renewal.renewed.status, PolicyStatus::Renewed);
    assert_eq!(renewal.successor.status, PolicyStatus::Pending);
    assert_eq!(renewal.successor.valid_from, policy.valid_to);

    let err = h
        .desk
        .entities
        .update_policy(&ventas, policy.id, premium_patch(1))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
}

#[tokio::test]
async fn cancelled_policies_are_terminal() {
    let h = Harness::new();
    let ventas = h.actor("ventas@agencia.mx", Role::Comercial);
    let client = h.client(&ventas, None, None);
    let policy = h.pending_policy(&ventas, &client, "AUT-1010");

    let usuario = h.actor("usuario@agencia.mx", Role::Usuario);
    let err = h.desk.policies.cancel(&usuario, policy.id, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let cancelled = h
        .desk
        .policies
        .cancel(&ventas, policy.id, Some("cliente desistió"))
        .unwrap();
    assert_eq!(cancelled.status, PolicyStatus::Cancelled);

    let err = h.desk.policies.approve(&h.admin, policy.id, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    let err = h
        .desk
        .entities
        .update_policy(&ventas, policy.id, premium_patch(1))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);

    let history = h.desk.history(&h.admin, EntityRef::Policy(policy.id)).unwrap();
    assert_eq!(history.last().map(|r| r.to_state.as_str()), Some("cancelled"));
}

#[tokio::test]
async fn only_admins_may_reject_an_active_policy() {
    let h = Harness::new();
    let ventas = h.actor("ventas@agencia.mx", Role::Comercial);
    let client = h.client(&ventas, None, None);
    let policy = h.active_policy(&ventas, &client, "AUT-1011");

    let err = h
        .desk
        .reject_policy(&ventas, policy.id, "La prima no coincide con la cotización")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    let unchanged = h.desk.entities.get_policy(&h.admin, policy.id).unwrap();
    assert_eq!(unchanged.status, PolicyStatus::Active);
    assert!(unchanged.validation.is_some());
    assert!(h.channel.sent().is_empty());

    let notified = h
        .desk
        .reject_policy(&h.admin, policy.id, "La prima no coincide con la cotización")
        .await
        .unwrap();
    assert_eq!(notified.outcome.policy.status, PolicyStatus::Rejected);
    assert!(notified.outcome.policy.validation.is_none());
    assert_eq!(notified.outcome.grant.holder_id, ventas.actor_id().unwrap());
}

#[tokio::test]
async fn revalidation_replaces_the_first_stamp() {
    let h = Harness::new();
    let ventas = h.actor("ventas@agencia.mx", Role::Comercial);
    let client = h.client(&ventas, None, None);
    let policy = h.active_policy(&ventas, &client, "AUT-1012");
    let first = policy.validation.clone().unwrap();
    assert_eq!(first.validated_at, fixtures::start_instant());

    h.desk
        .reject_policy(&h.admin, policy.id, "Falta el comprobante de domicilio")
        .await
        .unwrap();

    h.clock.advance(Duration::hours(1));
    let resubmitted = h
        .desk
        .entities
        .update_policy(&ventas, policy.id, premium_patch(1250000))
        .unwrap();
    assert_eq!(resubmitted.status, PolicyStatus::Pending);
    assert!(resubmitted.validation.is_none());
    assert!(resubmitted.rejection.is_none());

    h.clock.advance(Duration::hours(1));
    let approved = h.desk.policies.approve(&h.admin, policy.id, None).unwrap();
    let second = approved.validation.unwrap();
    assert_eq!(second.validated_at, fixtures::start_instant() + Duration::hours(2));
    assert_ne!(second.validated_at, first.validated_at);
    assert!(approved.rejection.is_none());
}

#[tokio::test]
async fn swept_grants_still_fail_as_an_expired_window() {
    let h = Harness::new();
    let ventas = h.actor("ventas@agencia.mx", Role::Comercial);
    let client = h.client(&ventas, None, None);
    let policy = h.pending_policy(&ventas, &client, "AUT-1013");

    let outcome = h
        .desk
        .reject_policy(&h.admin, policy.id, "La prima no coincide con la cotización")
        .await
        .unwrap()
        .outcome;
    h.clock.set(outcome.grant.expires_at + Duration::seconds(1));

    let anonymous = h.desk.context_for(None).unwrap();
    assert!(matches!(
        h.desk.sweep_expired_grants(&anonymous),
        Err(DeskError::Unauthenticated)
    ));
    let err = h.desk.sweep_expired_grants(&ventas).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    assert_eq!(h.desk.sweep_expired_grants(&h.admin).unwrap(), 1);

    let err = h
        .desk
        .entities
        .update_policy(&ventas, policy.id, premium_patch(1100000))
        .unwrap_err();
    assert!(matches!(err, DeskError::EditWindowExpired { .. }));
    assert_eq!(err.code(), "edit_window_expired");
}

#[tokio::test]
async fn renewal_refuses_a_taken_successor_number() {
    let h = Harness::new();
    let ventas = h.actor("ventas@agencia.mx", Role::Comercial);
    let client = h.client(&ventas, None, None);
    h.pending_policy(&ventas, &client, "AUT-1014-R");
    let policy = h.active_policy(&ventas, &client, "AUT-1014");

    let err = h.desk.policies.renew(&ventas, policy.id, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);

    let unchanged = h.desk.entities.get_policy(&h.admin, policy.id).unwrap();
    assert_eq!(unchanged.status, PolicyStatus::Active);
}
