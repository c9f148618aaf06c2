use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use dcim_api::{AccessConfig, AccessService, ServiceError};
use dcim_audit::{ActionKind, AuditError, InMemoryAuditStore, InMemoryStorage, Mutation};
use dcim_auth::{
    AccountStatus, AuthError, InMemoryIdentityStore, InMemoryRefreshTokenStore, Permission, Principal, PrincipalId,
    RoleAssignment, RoleName, SecretHasher, Sensitivity,
};
use dcim_core::TargetRef;
use serde_json::json;

struct Harness {
    service: AccessService,
    identity: Arc<InMemoryIdentityStore>,
    refresh_tokens: Arc<InMemoryRefreshTokenStore>,
    storage: Arc<InMemoryStorage>,
    audit: Arc<InMemoryAuditStore>,
    alice: Principal,
    bob: Principal,
}

fn config(pairs: &[(&str, &str)]) -> AccessConfig {
    let mut map: HashMap<String, String> = HashMap::from([("SIGNING_KEY".to_string(), "test-signing-key".to_string())]);
    for (k, v) in pairs {
        map.insert(k.to_string(), v.to_string());
    }
    AccessConfig::from_lookup(|key| map.get(key).cloned()).unwrap()
}

fn role(name: &str) -> RoleName {
    RoleName::new(name).unwrap()
}

async fn harness_with(config: AccessConfig, storage: InMemoryStorage) -> Harness {
    let hasher = SecretHasher::with_cost(64, 1, 1).unwrap();
    let identity = InMemoryIdentityStore::arc();

    let alice = Principal::new(PrincipalId::new(), "alice").with_role(role("ADMIN"));
    let bob = Principal::new(PrincipalId::new(), "bob").with_role(role("EDITOR"));
    identity.insert(alice.clone(), hasher.hash("alice-pw").unwrap());
    identity.insert(bob.clone(), hasher.hash("bob-pw").unwrap());

    let storage = Arc::new(storage);
    storage
        .seed(TargetRef::device("42"), json!({"name": "core-sw-1", "status": "active"}))
        .await;
    let audit = InMemoryAuditStore::arc();
    let refresh_tokens = InMemoryRefreshTokenStore::arc();

    let service = AccessService::build(
        &config,
        hasher,
        identity.clone(),
        refresh_tokens.clone(),
        storage.clone(),
        audit.clone(),
    )
    .await
    .unwrap();

    Harness {
        service,
        identity,
        refresh_tokens,
        storage,
        audit,
        alice,
        bob,
    }
}

async fn harness() -> Harness {
    harness_with(config(&[]), InMemoryStorage::new()).await
}

#[tokio::test]
async fn admin_login_allows_create_and_forbids_network_reset() {
    let h = harness().await;

    let login = h.service.login("alice", "alice-pw").await.unwrap();
    assert_eq!(login.principal_id, h.alice.id);
    assert_eq!(login.roles, vec![role("ADMIN")]);
    assert!(login.capabilities.can_view && login.capabilities.can_edit && login.capabilities.can_delete);

    let header = format!("Bearer {}", login.tokens.access_token);
    let claims = h.service.authenticate_header(Some(&header)).unwrap();
    assert_eq!(claims.sub, h.alice.id);

    assert!(h.service.authorize(&claims, Permission::DeviceCreate));
    assert!(!h.service.authorize(&claims, Permission::NetworkReset));

    let err = h
        .service
        .perform(&claims, Permission::NetworkReset, &Mutation::update(TargetRef::device("42"), json!({})))
        .await
        .unwrap_err();
    assert_eq!(err, ServiceError::Auth(AuthError::Forbidden(Permission::NetworkReset)));
    assert_eq!(err.status_code(), 403);
}

#[tokio::test]
async fn unknown_user_and_wrong_password_look_the_same() {
    let h = harness().await;

    let wrong = h.service.login("alice", "nope").await.unwrap_err();
    let unknown = h.service.login("mallory", "alice-pw").await.unwrap_err();

    assert_eq!(wrong, unknown);
    assert_eq!(wrong.status_code(), 401);
    assert_eq!(wrong.body(), unknown.body());
}

#[tokio::test]
async fn disabled_account_cannot_log_in_or_refresh() {
    let h = harness().await;
    let login = h.service.login("bob", "bob-pw").await.unwrap();

    h.identity.update_principal(h.bob.id, |p| p.status = AccountStatus::Disabled);

    let err = h.service.login("bob", "bob-pw").await.unwrap_err();
    assert_eq!(err, ServiceError::Auth(AuthError::AccountDisabled));
    assert_eq!(err.status_code(), 403);

    // A session that can no longer be continued, not a fresh login attempt.
    let err = h.service.refresh(&login.tokens.refresh_token).await.unwrap_err();
    assert_eq!(err, ServiceError::Auth(AuthError::Unauthenticated));
    assert_eq!(err.status_code(), 401);
}

#[tokio::test]
async fn editor_update_produces_exactly_one_entry() {
    let h = harness().await;
    let login = h.service.login("bob", "bob-pw").await.unwrap();
    let claims = h.service.authenticate_request(&login.tokens.access_token).unwrap();
    let device = TargetRef::device("42");

    let entry = h
        .service
        .perform_mutation(&claims, &Mutation::update(device.clone(), json!({"status": "retired"})))
        .await
        .unwrap();

    assert_eq!(entry.actor(), h.bob.id);
    assert_eq!(entry.action(), ActionKind::Update);
    assert_eq!(entry.target(), &device);
    assert_eq!(entry.before().unwrap()["status"], "active");
    assert_eq!(entry.after().unwrap()["status"], "retired");
    assert_eq!(h.audit.entries(), vec![entry]);
    assert_eq!(h.storage.get(&device).await.unwrap()["status"], "retired");
}

#[tokio::test]
async fn editor_cannot_delete() {
    let h = harness().await;
    let login = h.service.login("bob", "bob-pw").await.unwrap();
    let claims = h.service.authenticate_request(&login.tokens.access_token).unwrap();

    let err = h
        .service
        .perform_mutation(&claims, &Mutation::delete(TargetRef::device("42")))
        .await
        .unwrap_err();

    assert_eq!(err, ServiceError::Auth(AuthError::Forbidden(Permission::DeviceDelete)));
    assert!(h.storage.get(&TargetRef::device("42")).await.is_some());
    assert!(h.audit.entries().is_empty());
}

#[tokio::test]
async fn failed_audit_write_fails_the_update_in_both_modes() {
    // Transactional: nothing is committed.
    let h = harness().await;
    let login = h.service.login("bob", "bob-pw").await.unwrap();
    let claims = h.service.authenticate_request(&login.tokens.access_token).unwrap();
    h.audit.fail_appends(true);

    let err = h
        .service
        .perform(&claims, Permission::DeviceUpdate, &Mutation::update(TargetRef::device("42"), json!({"status": "retired"})))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 500);
    assert_eq!(h.storage.get(&TargetRef::device("42")).await.unwrap()["status"], "active");
    assert!(h.audit.entries().is_empty());

    // Sequential: the mutation lands, the call still fails.
    let h = harness_with(config(&[]), InMemoryStorage::non_transactional()).await;
    h.audit.fail_appends(true);
    let login = h.service.login("bob", "bob-pw").await.unwrap();
    let claims = h.service.authenticate_request(&login.tokens.access_token).unwrap();

    let err = h
        .service
        .perform(&claims, Permission::DeviceUpdate, &Mutation::update(TargetRef::device("42"), json!({"status": "retired"})))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Audit(AuditError::AuditWriteFailed { .. })));
    assert_eq!(err.status_code(), 500);
    assert!(h.audit.entries().is_empty());
}

#[tokio::test]
async fn log_change_records_through_the_audit_store() {
    let h = harness().await;
    let login = h.service.login("alice", "alice-pw").await.unwrap();
    let claims = h.service.authenticate_request(&login.tokens.access_token).unwrap();
    let rack = TargetRef::new(dcim_core::EntityKind::Rack, "r-7");

    let entry = h
        .service
        .log_change(&claims, ActionKind::Create, rack.clone(), None, Some(json!({"name": "R7"})))
        .await
        .unwrap();

    assert_eq!(h.audit.for_target(&rack), vec![entry]);
}

#[tokio::test]
async fn performed_and_logged_changes_share_one_ordered_log() {
    let h = harness().await;
    let login = h.service.login("alice", "alice-pw").await.unwrap();
    let claims = h.service.authenticate_request(&login.tokens.access_token).unwrap();
    let rack = TargetRef::new(dcim_core::EntityKind::Rack, "r-7");

    let performed = h
        .service
        .perform_mutation(&claims, &Mutation::update(TargetRef::device("42"), json!({"status": "retired"})))
        .await
        .unwrap();
    let logged = h
        .service
        .log_change(&claims, ActionKind::Create, rack, None, Some(json!({"name": "R7"})))
        .await
        .unwrap();

    assert_eq!(h.audit.entries(), vec![performed, logged]);
}

#[tokio::test]
async fn logout_revokes_refresh_tokens() {
    let h = harness().await;
    let first = h.service.login("alice", "alice-pw").await.unwrap();
    let claims = h.service.authenticate_request(&first.tokens.access_token).unwrap();
    assert!(h.service.refresh(&first.tokens.refresh_token).await.is_ok());

    h.service.logout(&claims).await.unwrap();

    assert_eq!(h.refresh_tokens.count(h.alice.id), 0);
    let err = h.service.refresh(&first.tokens.refresh_token).await.unwrap_err();
    assert_eq!(err, ServiceError::Auth(AuthError::Unauthenticated));
    assert_eq!(err.status_code(), 401);

    // The access token lives on until it expires.
    assert!(h.service.authenticate_request(&first.tokens.access_token).is_ok());

    let again = h.service.login("alice", "alice-pw").await.unwrap();
    assert!(h.service.refresh(&again.tokens.refresh_token).await.is_ok());
}

#[tokio::test]
async fn refresh_token_never_handed_out_is_rejected() {
    let h = harness().await;

    // Validly signed by a second service sharing the key, but never stored here.
    let other = harness().await;
    let foreign = other.service.login("alice", "alice-pw").await.unwrap();
    h.identity.insert(other.alice.clone(), "unused");

    let err = h.service.refresh(&foreign.tokens.refresh_token).await.unwrap_err();
    assert_eq!(err, ServiceError::Auth(AuthError::Unauthenticated));
    assert_eq!(err.status_code(), 401);
}

#[tokio::test]
async fn expired_access_token_maps_to_session_expired() {
    let h = harness().await;
    let issued = Utc::now() - Duration::hours(1);
    let login = h.service.login_at("alice", "alice-pw", issued).await.unwrap();

    let err = h.service.authenticate_request(&login.tokens.access_token).unwrap_err();
    assert_eq!(err, ServiceError::Auth(AuthError::TokenExpired));
    assert_eq!(err.status_code(), 419);

    // The refresh token outlives it.
    let pair = h.service.refresh(&login.tokens.refresh_token).await.unwrap();
    assert!(h.service.authenticate_request(&pair.access_token).is_ok());
    assert_eq!(pair.refresh_token, login.tokens.refresh_token);
}

#[tokio::test]
async fn refresh_token_is_not_an_access_token() {
    let h = harness().await;
    let login = h.service.login("alice", "alice-pw").await.unwrap();

    let err = h.service.authenticate_request(&login.tokens.refresh_token).unwrap_err();
    assert_eq!(err, ServiceError::Auth(AuthError::Unauthenticated));

    let err = h.service.refresh(&login.tokens.access_token).await.unwrap_err();
    assert_eq!(err, ServiceError::Auth(AuthError::Unauthenticated));
}

#[tokio::test]
async fn role_snapshot_is_stale_until_a_new_token_is_issued() {
    let h = harness().await;
    let old = h.service.login("bob", "bob-pw").await.unwrap();
    let old_claims = h.service.authenticate_request(&old.tokens.access_token).unwrap();

    h.identity.update_principal(h.bob.id, |p| {
        p.assignments = vec![RoleAssignment::active(role("VIEWER"))];
    });

    // The old token still carries EDITOR.
    assert!(h.service.authorize(&old_claims, Permission::DeviceUpdate));

    let fresh = h.service.refresh(&old.tokens.refresh_token).await.unwrap();
    let fresh_claims = h.service.authenticate_request(&fresh.access_token).unwrap();
    assert_eq!(fresh_claims.roles, vec![role("VIEWER")]);
    assert!(!h.service.authorize(&fresh_claims, Permission::DeviceUpdate));
}

#[tokio::test]
async fn live_role_check_applies_to_sensitive_endpoints_only() {
    let h = harness_with(config(&[("PER_ENDPOINT_LIVE_ROLE_CHECK", "true")]), InMemoryStorage::new()).await;
    let login = h.service.login("alice", "alice-pw").await.unwrap();
    let claims = h.service.authenticate_request(&login.tokens.access_token).unwrap();

    h.identity.update_principal(h.alice.id, |p| {
        p.assignments = vec![RoleAssignment::active(role("VIEWER"))];
    });

    assert!(h
        .service
        .authorize_endpoint(&claims, Permission::DeviceDelete, Sensitivity::Standard)
        .await
        .is_ok());
    let err = h
        .service
        .authorize_endpoint(&claims, Permission::DeviceDelete, Sensitivity::Sensitive)
        .await
        .unwrap_err();
    assert_eq!(err, ServiceError::Auth(AuthError::Forbidden(Permission::DeviceDelete)));
}

#[tokio::test]
async fn disabled_account_fails_sensitive_live_checks() {
    let h = harness_with(config(&[("PER_ENDPOINT_LIVE_ROLE_CHECK", "true")]), InMemoryStorage::new()).await;
    let login = h.service.login("alice", "alice-pw").await.unwrap();
    let claims = h.service.authenticate_request(&login.tokens.access_token).unwrap();

    h.identity.update_principal(h.alice.id, |p| p.status = AccountStatus::Disabled);

    let err = h
        .service
        .authorize_endpoint(&claims, Permission::DeviceView, Sensitivity::Sensitive)
        .await
        .unwrap_err();
    assert_eq!(err, ServiceError::Auth(AuthError::Unauthenticated));
    assert_eq!(err.status_code(), 401);
}

#[tokio::test]
async fn missing_or_foreign_authorization_header_is_unauthenticated() {
    let h = harness().await;

    for header in [None, Some("Basic abc"), Some("Bearer "), Some("Bearer not.a.token")] {
        let err = h.service.authenticate_header(header).unwrap_err();
        assert_eq!(err.status_code(), 401, "{header:?}");
    }
}

#[tokio::test]
async fn rotated_key_invalidates_outstanding_tokens() {
    let h = harness().await;
    let login = h.service.login("alice", "alice-pw").await.unwrap();

    h.service.rotate_signing_key(config(&[("SIGNING_KEY", "next-key")]).signing_key());

    let err = h.service.authenticate_request(&login.tokens.access_token).unwrap_err();
    assert_eq!(err, ServiceError::Auth(AuthError::InvalidSignature));
}

#[tokio::test]
async fn role_reload_takes_effect_without_restart() {
    let h = harness().await;
    let login = h.service.login("alice", "alice-pw").await.unwrap();
    let claims = h.service.authenticate_request(&login.tokens.access_token).unwrap();
    assert!(!h.service.authorize(&claims, Permission::NetworkReset));

    let mut defs = dcim_auth::RoleTable::builtin_definitions();
    defs.retain(|d| d.name != role("ADMIN"));
    defs.push(
        dcim_auth::RoleDefinition::new(role("ADMIN"), [Permission::NetworkReset, Permission::UserManage])
            .inheriting(role("EDITOR")),
    );
    h.identity.set_role_definitions(defs);

    let epoch = h.service.reload_roles().await.unwrap();
    assert!(epoch > 1);
    assert!(h.service.authorize(&claims, Permission::NetworkReset));
    assert!(!h.service.authorize(&claims, Permission::DeviceDelete));

    let explanation = h.service.explain(&claims, Permission::DeviceDelete);
    assert!(!explanation.granted);
    assert_eq!(explanation.epoch, epoch);
}
