//! Integration tests for administrative account operations.

mod helpers;

use gatekeeper_auth::CreateIdentityRequest;
use gatekeeper_core::ErrorKind;
use gatekeeper_core::config::BootstrapConfig;
use gatekeeper_core::error::reason;
use gatekeeper_entity::{UserRole, UserStatus};

use helpers::{PASSWORD, TestApp};

#[tokio::test]
async fn test_admin_created_identity_can_login() {
    let app = TestApp::new().await;
    let root = app.create_superadmin("root@acme.test").await;
    let actor = app.actor(root, UserRole::SuperAdmin);

    let created = app
        .runtime
        .accounts
        .create_identity(
            &actor,
            CreateIdentityRequest {
                email: "New@Acme.test".into(),
                password: PASSWORD.into(),
                name: "New".into(),
                role: UserRole::Manager,
                tenant_id: app.tenant_id,
            },
        )
        .await
        .unwrap();
    assert_eq!(created.email, "new@acme.test");

    let outcome = app.runtime.sessions.login("new@acme.test", PASSWORD).await.unwrap();
    assert_eq!(outcome.identity.role, UserRole::Manager);
}

#[tokio::test]
async fn test_reactivation_requires_fresh_login() {
    let app = TestApp::new().await;
    let root = app.create_superadmin("root@acme.test").await;
    let actor = app.actor(root, UserRole::SuperAdmin);
    let outcome = app.register("ann@acme.test", UserRole::Viewer).await;
    let id = outcome.identity.id;

    app.runtime
        .accounts
        .change_status(&actor, id, UserStatus::Inactive, None)
        .await
        .unwrap();
    app.runtime
        .accounts
        .change_status(&actor, id, UserStatus::Active, None)
        .await
        .unwrap();

    // Deactivation cleared the refresh token; reactivating does not restore it.
    let err = app
        .runtime
        .sessions
        .refresh(&outcome.tokens.refresh_token)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Unauthorized);
    assert!(app.runtime.sessions.login("ann@acme.test", PASSWORD).await.is_ok());
}

#[tokio::test]
async fn test_suspended_identity_fails_gate_with_live_token() {
    let app = TestApp::new().await;
    let root = app.create_superadmin("root@acme.test").await;
    let outcome = app.register("ann@acme.test", UserRole::Viewer).await;

    app.runtime
        .accounts
        .change_status(
            &app.actor(root, UserRole::SuperAdmin),
            outcome.identity.id,
            UserStatus::Suspended,
            Some("chargeback"),
        )
        .await
        .unwrap();

    let header = TestApp::bearer(&outcome.tokens.access_token);
    let err = app
        .runtime
        .auth_gate
        .authenticate(Some(&header))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);
    assert_eq!(err.reason, Some(reason::ACCOUNT_SUSPENDED));
}

#[tokio::test]
async fn test_register_rejects_superadmin_role() {
    let app = TestApp::new().await;
    let err = app
        .runtime
        .sessions
        .register(gatekeeper_auth::Registration {
            email: "x@acme.test".into(),
            password: PASSWORD.into(),
            name: "X".into(),
            tenant_id: app.tenant_id,
            role: Some(UserRole::SuperAdmin),
        })
        .await
        .unwrap_err();
    assert_eq!(err.reason, Some(reason::ROLE_NOT_ALLOWED));
}

#[tokio::test]
async fn test_deleted_identity_cannot_refresh() {
    let app = TestApp::new().await;
    let root = app.create_superadmin("root@acme.test").await;
    let outcome = app.register("ann@acme.test", UserRole::Viewer).await;

    app.runtime
        .accounts
        .delete_identity(&app.actor(root, UserRole::SuperAdmin), outcome.identity.id)
        .await
        .unwrap();

    let err = app
        .runtime
        .sessions
        .refresh(&outcome.tokens.refresh_token)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Unauthorized);
}

#[tokio::test]
async fn test_bootstrap_creates_loginable_superadmin() {
    let app = TestApp::new().await;
    let mut config = app.config.clone();
    config.bootstrap = Some(BootstrapConfig {
        tenant_name: "Platform".into(),
        superadmin_email: "root@platform.test".into(),
        superadmin_password: PASSWORD.into(),
        superadmin_name: "Root".into(),
    });

    app.runtime.bootstrap(&config).await.unwrap();
    app.runtime.bootstrap(&config).await.unwrap();

    let outcome = app
        .runtime
        .sessions
        .login("root@platform.test", PASSWORD)
        .await
        .unwrap();
    assert_eq!(outcome.identity.role, UserRole::SuperAdmin);
}
