mod common;

use std::sync::atomic::Ordering;

use assert_matches::assert_matches;

use fieldboard_core::acl::{AclGrant, PermissionSet, Principal, PrincipalType};
use fieldboard_core::history::{PublishOutcome, VersionStatus};
use fieldboard_core::CoreError;
use fieldboard_sync::acl::RegionAclService;
use fieldboard_sync::events::SyncEvent;
use fieldboard_sync::SyncError;

use common::{harness, sample_cards, snapshot_of, FakeBackend};

// ---------------------------------------------------------------------------
// Publishing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn publish_archives_the_previous_version() {
    let cards = sample_cards();
    let h = harness(FakeBackend::with_cards(&cards), true).await;
    let mut events = h.events.subscribe();
    let mut session = h.session(&snapshot_of(&cards)).await;

    let first = session.history().current().id;
    assert_eq!(
        session.publish(first, Some("launch".into())).await.unwrap(),
        PublishOutcome::Published { archived: None }
    );

    session.move_card("errors", 400.0, 400.0).await.unwrap();
    let second = session.history().current().id;
    assert_eq!(
        session.publish_current(None).await.unwrap(),
        PublishOutcome::Published {
            archived: Some(first)
        }
    );

    let history = session.history();
    assert_eq!(history.get(first).unwrap().status, VersionStatus::Archived);
    assert_eq!(history.published().map(|v| v.id), Some(second));
    assert_eq!(h.backend.publish_calls.load(Ordering::SeqCst), 2);

    let mut published = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SyncEvent::VersionPublished { version_id, .. } = event {
            published.push(version_id);
        }
    }
    assert_eq!(published, vec![first, second]);
}

#[tokio::test]
async fn republishing_skips_the_remote_call() {
    let cards = sample_cards();
    let h = harness(FakeBackend::with_cards(&cards), true).await;
    let mut session = h.session(&snapshot_of(&cards)).await;

    session.publish_current(None).await.unwrap();
    assert_eq!(
        session.publish_current(None).await.unwrap(),
        PublishOutcome::AlreadyPublished
    );
    assert_eq!(h.backend.publish_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_publish_leaves_history_unchanged() {
    let cards = sample_cards();
    let h = harness(FakeBackend::with_cards(&cards), true).await;
    let mut session = h.session(&snapshot_of(&cards)).await;

    let first = session.history().current().id;
    session.publish(first, None).await.unwrap();
    session.move_card("latency", 10.0, 10.0).await.unwrap();
    let draft = session.history().current().id;

    h.backend.fail_publish(Some(503));
    let err = session.publish(draft, None).await.unwrap_err();
    assert!(err.is_retryable());

    let history = session.history();
    assert_eq!(history.get(draft).unwrap().status, VersionStatus::Draft);
    assert_eq!(history.published().map(|v| v.id), Some(first));
    // No automatic retry.
    assert_eq!(h.backend.publish_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn confirmation_for_another_version_is_a_conflict() {
    let cards = sample_cards();
    let h = harness(FakeBackend::with_cards(&cards), true).await;
    let mut session = h.session(&snapshot_of(&cards)).await;
    let draft = session.history().current().id;

    h.backend.confirm_publish_as(uuid::Uuid::now_v7());
    let err = session.publish(draft, None).await.unwrap_err();
    assert_matches!(err, SyncError::Core(CoreError::Conflict(_)));

    let history = session.history();
    assert_eq!(history.get(draft).unwrap().status, VersionStatus::Draft);
    assert!(history.published().is_none());
}

#[tokio::test]
async fn publishing_an_unknown_version_is_not_found() {
    let h = harness(FakeBackend::with_cards(&[]), true).await;
    let mut session = h.session(&snapshot_of(&[])).await;

    let err = session.publish(uuid::Uuid::new_v4(), None).await.unwrap_err();
    assert_matches!(err, SyncError::Core(CoreError::NotFound { .. }));
    assert_eq!(h.backend.publish_calls.load(Ordering::SeqCst), 0);
}

// ---------------------------------------------------------------------------
// Region ACL
// ---------------------------------------------------------------------------

fn grant(principal_type: PrincipalType, id: &str, permission_set: PermissionSet) -> AclGrant {
    AclGrant {
        principal_type,
        principal_id: id.to_string(),
        permission_set,
    }
}

async fn seeded_acl() -> (std::sync::Arc<FakeBackend>, RegionAclService) {
    let backend = FakeBackend::with_cards(&[]);
    backend.put_seed("north", grant(PrincipalType::User, "owner", PermissionSet::ALL));
    backend.put_seed("north", grant(PrincipalType::User, "viewer", PermissionSet::READ_ONLY));
    backend.put_seed("north", grant(PrincipalType::Team, "field-ops", PermissionSet {
        read: true,
        edit: true,
        share: false,
    }));
    let service = RegionAclService::new(backend.clone());
    (backend, service)
}

#[tokio::test]
async fn read_only_principal_cannot_share() {
    let (backend, service) = seeded_acl().await;
    let viewer = Principal::user("viewer");

    assert!(!service.can_share("north", &viewer).await.unwrap());
    let err = service
        .set_acl("north", &viewer, grant(PrincipalType::User, "intern", PermissionSet::READ_ONLY))
        .await
        .unwrap_err();

    assert_matches!(err, SyncError::Core(CoreError::Forbidden(_)));
    assert_eq!(backend.acl_writes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn effective_permissions_union_user_and_team_grants() {
    let (_backend, service) = seeded_acl().await;
    let viewer = Principal {
        user_id: "viewer".to_string(),
        role_ids: Vec::new(),
        team_ids: vec!["field-ops".to_string()],
    };

    let perms = service.effective_permissions("north", &viewer).await.unwrap();
    assert!(perms.read && perms.edit);
    assert!(!perms.share);

    let stranger = service
        .effective_permissions("north", &Principal::user("nobody"))
        .await
        .unwrap();
    assert_eq!(stranger, PermissionSet::NONE);
}

#[tokio::test]
async fn sharer_can_grant_and_revoke() {
    let (backend, service) = seeded_acl().await;
    let owner = Principal::user("owner");

    let entry = service
        .set_acl("north", &owner, grant(PrincipalType::Role, "auditor", PermissionSet::READ_ONLY))
        .await
        .unwrap();
    assert_eq!(backend.acl_writes.load(Ordering::SeqCst), 1);
    assert_eq!(service.load("north").await.unwrap().entries.len(), 4);

    service.remove_acl("north", &owner, &entry.id).await.unwrap();
    assert_eq!(service.load("north").await.unwrap().entries.len(), 3);
}
