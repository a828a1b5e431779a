//! Integration tests for permission resolution, caching, and gates.

mod helpers;

use uuid::Uuid;

use gatekeeper_cache::keys;
use gatekeeper_core::ErrorKind;
use gatekeeper_core::error::reason;
use gatekeeper_core::traits::CacheProvider;
use gatekeeper_entity::{EffectivePermissionSet, PermissionTuple, UserRole};

use helpers::TestApp;

#[tokio::test]
async fn test_assign_then_revoke_is_immediately_visible() {
    let app = TestApp::new().await;
    let admin = app.create_superadmin("root@acme.test").await;
    let user = app.register("ann@acme.test", UserRole::Viewer).await.identity.id;
    let orders = app.create_grant("sales", "read", "orders").await;
    let resolver = &app.runtime.resolver;

    assert!(!resolver.check(user, &orders).await.unwrap());

    app.runtime.permissions.assign(admin, user, &orders).await.unwrap();
    assert!(resolver.check(user, &orders).await.unwrap());

    // Warm the cache, then revoke: the very next check must see it.
    assert!(resolver.check(user, &orders).await.unwrap());
    app.runtime.permissions.revoke(admin, user, &orders).await.unwrap();
    assert!(!resolver.check(user, &orders).await.unwrap());
}

#[tokio::test]
async fn test_resolve_populates_cache_and_mutation_clears_it() {
    let app = TestApp::new().await;
    let admin = app.create_superadmin("root@acme.test").await;
    let user = app.register("ann@acme.test", UserRole::Viewer).await.identity.id;
    let orders = app.create_grant("sales", "read", "orders").await;
    app.runtime.permissions.assign(admin, user, &orders).await.unwrap();

    let resolved = app.runtime.resolver.resolve(user).await.unwrap();
    let key = keys::permissions(user);
    let cached: Option<EffectivePermissionSet> = app.runtime.cache.get_json(&key).await.unwrap();
    assert_eq!(cached, Some(resolved));

    app.runtime.permissions.revoke(admin, user, &orders).await.unwrap();
    assert!(!app.runtime.cache.exists(&key).await.unwrap());
}

#[tokio::test]
async fn test_superadmin_bypass_and_assignment_rejected() {
    let app = TestApp::new().await;
    let root = app.create_superadmin("root@acme.test").await;
    let other = app.create_superadmin("boss@acme.test").await;
    let orders = app.create_grant("sales", "read", "orders").await;

    let never_assigned = PermissionTuple::new("hr", "delete", "payroll");
    assert!(app.runtime.resolver.check(root, &never_assigned).await.unwrap());
    assert!(
        app.runtime
            .resolver
            .check_all(root, &[orders.clone(), never_assigned])
            .await
            .unwrap()
    );

    let err = app
        .runtime
        .permissions
        .assign(root, other, &orders)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);
    assert_eq!(err.reason, Some(reason::SUPERADMIN_PROTECTED));
}

#[tokio::test]
async fn test_assignment_errors() {
    let app = TestApp::new().await;
    let admin = app.create_superadmin("root@acme.test").await;
    let user = app.register("ann@acme.test", UserRole::Viewer).await.identity.id;
    let orders = app.create_grant("sales", "read", "orders").await;
    let perms = &app.runtime.permissions;

    let unknown = PermissionTuple::new("nope", "nope", "nope");
    assert_eq!(perms.assign(admin, user, &unknown).await.unwrap_err().kind, ErrorKind::NotFound);
    assert_eq!(
        perms.assign(admin, Uuid::new_v4(), &orders).await.unwrap_err().kind,
        ErrorKind::NotFound
    );

    perms.assign(admin, user, &orders).await.unwrap();
    assert_eq!(perms.assign(admin, user, &orders).await.unwrap_err().kind, ErrorKind::Conflict);

    perms.revoke(admin, user, &orders).await.unwrap();
    assert_eq!(perms.revoke(admin, user, &orders).await.unwrap_err().kind, ErrorKind::NotFound);

    // A revoked row is re-granted, not duplicated.
    perms.assign(admin, user, &orders).await.unwrap();
    let rows = perms.list_assignments(user).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].granted);
}

#[tokio::test]
async fn test_grant_catalog_rules() {
    let app = TestApp::new().await;
    let admin = app.create_superadmin("root@acme.test").await;
    let user = app.register("ann@acme.test", UserRole::Viewer).await.identity.id;
    let perms = &app.runtime.permissions;

    let orders = app.create_grant("sales", "read", "orders").await;
    let dup = perms.create_grant(&orders, "again").await.unwrap_err();
    assert_eq!(dup.kind, ErrorKind::Conflict);

    let grant = perms
        .list_grants()
        .await
        .unwrap()
        .into_iter()
        .find(|g| g.matches(&orders))
        .unwrap();
    let updated = perms
        .update_grant_description(grant.id, "Read customer orders")
        .await
        .unwrap();
    assert_eq!(updated.description, "Read customer orders");

    perms.assign(admin, user, &orders).await.unwrap();
    let referenced = perms.delete_grant(grant.id).await.unwrap_err();
    assert_eq!(referenced.kind, ErrorKind::Conflict);

    let spare = app.create_grant("sales", "write", "orders").await;
    let spare_id = perms
        .list_grants()
        .await
        .unwrap()
        .into_iter()
        .find(|g| g.matches(&spare))
        .unwrap()
        .id;
    perms.delete_grant(spare_id).await.unwrap();
    assert_eq!(perms.delete_grant(spare_id).await.unwrap_err().kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_permission_gate_composition() {
    let app = TestApp::new().await;
    let admin = app.create_superadmin("root@acme.test").await;
    let outcome = app.register("ann@acme.test", UserRole::Viewer).await;
    let read = app.create_grant("sales", "read", "orders").await;
    let write = app.create_grant("sales", "write", "orders").await;
    app.runtime.permissions.assign(admin, outcome.identity.id, &read).await.unwrap();

    let header = TestApp::bearer(&outcome.tokens.access_token);
    let ctx = app.runtime.auth_gate.authenticate(Some(&header)).await.unwrap();
    let gate = &app.runtime.permission_gate;

    gate.require(&ctx, &read).await.unwrap();
    gate.require_any(&ctx, &[read.clone(), write.clone()]).await.unwrap();

    let denied = gate.require(&ctx, &write).await.unwrap_err();
    assert_eq!(denied.kind, ErrorKind::Forbidden);
    assert_eq!(denied.reason, Some(reason::INSUFFICIENT_PERMISSION));

    let denied = gate.require_all(&ctx, &[read, write]).await.unwrap_err();
    assert_eq!(denied.reason, Some(reason::INSUFFICIENT_PERMISSION));
}

#[tokio::test]
async fn test_role_change_to_superadmin_drops_assignments() {
    let app = TestApp::new().await;
    let root = app.create_superadmin("root@acme.test").await;
    let user = app.register("ann@acme.test", UserRole::Viewer).await.identity.id;
    let orders = app.create_grant("sales", "read", "orders").await;
    app.runtime.permissions.assign(root, user, &orders).await.unwrap();
    app.runtime.resolver.resolve(user).await.unwrap();

    app.runtime
        .accounts
        .change_role(&app.actor(root, UserRole::SuperAdmin), user, UserRole::SuperAdmin)
        .await
        .unwrap();

    assert!(app.runtime.permissions.list_assignments(user).await.unwrap().is_empty());
    let set = app.runtime.resolver.resolve(user).await.unwrap();
    assert!(set.contains(&orders));
}
