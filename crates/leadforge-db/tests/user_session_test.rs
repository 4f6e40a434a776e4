//! Users, roles, and refresh sessions. Skipped when DATABASE_URL is unset.

use chrono::{Duration, Utc};
use leadforge_db::test_fixtures::TestTenant;
use leadforge_db::{AuditFilter, Error, Plan, UserRole};

#[tokio::test]
async fn test_last_owner_cannot_be_demoted_or_deactivated() {
    let Some(t) = TestTenant::create().await else {
        return;
    };
    let err = t
        .db
        .users
        .set_role(t.company.id, t.owner.id, UserRole::Admin, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    let err = t
        .db
        .users
        .deactivate(t.company.id, t.owner.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    // With a second owner the first may step down.
    let second = t.member(UserRole::Member).await;
    t.db.users
        .set_role(t.company.id, second.id, UserRole::Owner, Some(t.owner.id))
        .await
        .unwrap();
    let demoted = t
        .db
        .users
        .set_role(t.company.id, t.owner.id, UserRole::Admin, Some(second.id))
        .await
        .unwrap();
    assert_eq!(demoted.role, UserRole::Admin);
}

#[tokio::test]
async fn test_email_is_unique_across_companies() {
    let Some(t) = TestTenant::create().await else {
        return;
    };
    let other = TestTenant::create_in(t.db.clone()).await;
    let clash = leadforge_db::NewUser {
        email: t.owner.email.clone(),
        password_hash: "x".into(),
        full_name: None,
        role: UserRole::Member,
    };
    let err = other
        .db
        .users
        .create(other.company.id, &clash, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn test_rotation_links_sessions_and_rejects_reuse() {
    let Some(t) = TestTenant::create().await else {
        return;
    };
    let hash_a = format!("hash-a-{}", uuid::Uuid::new_v4());
    let hash_b = format!("hash-b-{}", uuid::Uuid::new_v4());
    let expires = Utc::now() + Duration::days(30);

    let a = t.db.sessions.create(t.owner.id, &hash_a, expires, Some("test")).await.unwrap();
    let b = t
        .db
        .sessions
        .rotate(a.id, &hash_b, expires, None)
        .await
        .unwrap()
        .expect("live session rotates");

    let old = t.db.sessions.find_by_hash(&hash_a).await.unwrap().unwrap();
    assert!(old.revoked_at.is_some());
    assert_eq!(old.replaced_by, Some(b.id));
    assert!(old.was_rotated());

    // Rotating the already-rotated session is refused.
    let again = t
        .db
        .sessions
        .rotate(a.id, &format!("hash-c-{}", uuid::Uuid::new_v4()), expires, None)
        .await
        .unwrap();
    assert!(again.is_none());

    assert_eq!(t.db.sessions.revoke_all_for_user(t.owner.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_deactivation_revokes_sessions() {
    let Some(t) = TestTenant::create().await else {
        return;
    };
    let member = t.member(UserRole::Member).await;
    let hash = format!("hash-{}", uuid::Uuid::new_v4());
    t.db.sessions
        .create(member.id, &hash, Utc::now() + Duration::days(1), None)
        .await
        .unwrap();

    let user = t
        .db
        .users
        .deactivate(t.company.id, member.id, Some(t.owner.id))
        .await
        .unwrap();
    assert!(!user.is_active);
    let session = t.db.sessions.find_by_hash(&hash).await.unwrap().unwrap();
    assert!(session.revoked_at.is_some());
}

#[tokio::test]
async fn test_user_and_plan_changes_are_audited_with_the_write() {
    let Some(t) = TestTenant::create().await else {
        return;
    };
    let member = t.member(UserRole::Member).await;
    t.db.users
        .set_role(t.company.id, member.id, UserRole::Admin, Some(t.owner.id))
        .await
        .unwrap();
    // Setting the same role again is not a change.
    t.db.users
        .set_role(t.company.id, member.id, UserRole::Admin, Some(t.owner.id))
        .await
        .unwrap();
    t.db.users
        .deactivate(t.company.id, member.id, Some(t.owner.id))
        .await
        .unwrap();

    let filter = AuditFilter {
        entity_type: Some("user".into()),
        entity_id: Some(member.id),
        limit: 50,
        offset: 0,
    };
    let (entries, total) = t.db.audit.list(t.company.id, &filter).await.unwrap();
    assert_eq!(total, 3);
    let actions: Vec<&str> = entries.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(actions, ["user.deactivated", "user.role_changed", "user.created"]);
    let role_change = &entries[1];
    assert_eq!(role_change.actor_id, Some(t.owner.id));
    assert_eq!(role_change.details["from"], "member");
    assert_eq!(role_change.details["to"], "admin");

    let (company, previous) = t
        .db
        .companies
        .set_plan(t.company.id, Plan::Growth, Some(t.owner.id))
        .await
        .unwrap();
    assert_eq!(previous, Plan::Free);
    assert_eq!(company.plan, Plan::Growth);

    let filter = AuditFilter {
        entity_type: Some("company".into()),
        entity_id: Some(t.company.id),
        limit: 50,
        offset: 0,
    };
    let (entries, _) = t.db.audit.list(t.company.id, &filter).await.unwrap();
    let plan_change = entries
        .iter()
        .find(|e| e.action == "company.plan_changed")
        .expect("plan change audited");
    assert_eq!(plan_change.details["from"], "free");
    assert_eq!(plan_change.details["to"], "growth");
}
