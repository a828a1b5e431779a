//! Integration tests for the session lifecycle.

mod helpers;

use gatekeeper_core::ErrorKind;
use gatekeeper_core::error::reason;
use gatekeeper_entity::{UserRole, UserStatus};

use helpers::{PASSWORD, TestApp};

#[tokio::test]
async fn test_register_login_refresh_logout_scenario() {
    let app = TestApp::new().await;
    let sessions = &app.runtime.sessions;

    let registered = app.register("a@acme.test", UserRole::Viewer).await;
    assert_eq!(registered.identity.role, UserRole::Viewer);

    let login = sessions.login("a@acme.test", PASSWORD).await.unwrap();
    let r1 = login.tokens.refresh_token;
    assert_ne!(r1, registered.tokens.refresh_token);

    let refreshed = sessions.refresh(&r1).await.unwrap();
    let r2 = refreshed.tokens.refresh_token;
    assert_ne!(r2, r1);

    let replay = sessions.refresh(&r1).await.unwrap_err();
    assert_eq!(replay.kind, ErrorKind::Unauthorized);

    sessions.logout(registered.identity.id).await.unwrap();
    let after_logout = sessions.refresh(&r2).await.unwrap_err();
    assert_eq!(after_logout.kind, ErrorKind::Unauthorized);
}

#[tokio::test]
async fn test_login_then_authenticate_access_token() {
    let app = TestApp::new().await;
    let registered = app.register("b@acme.test", UserRole::Manager).await;

    let login = app.runtime.sessions.login("b@acme.test", PASSWORD).await.unwrap();
    let header = TestApp::bearer(&login.tokens.access_token);
    let ctx = app
        .runtime
        .auth_gate
        .authenticate(Some(&header))
        .await
        .unwrap();

    assert_eq!(ctx.user_id, registered.identity.id);
    assert_eq!(ctx.role, UserRole::Manager);
    assert_eq!(ctx.tenant_id, app.tenant_id);
}

#[tokio::test]
async fn test_single_character_password_mutations_fail() {
    let app = TestApp::new().await;
    app.register("c@acme.test", UserRole::Viewer).await;

    let mut mutations = Vec::new();
    for (i, ch) in PASSWORD.char_indices() {
        let mut replaced = PASSWORD.to_string();
        let other = if ch == 'x' { "y" } else { "x" };
        replaced.replace_range(i..i + ch.len_utf8(), other);
        mutations.push(replaced);

        let mut dropped = PASSWORD.to_string();
        dropped.remove(i);
        mutations.push(dropped);
    }
    mutations.push(format!("{PASSWORD}!"));

    for candidate in mutations {
        let err = app
            .runtime
            .sessions
            .login("c@acme.test", &candidate)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidCredentials, "{candidate}");
    }
}

#[tokio::test]
async fn test_unknown_email_and_wrong_password_look_the_same() {
    let app = TestApp::new().await;
    app.register("d@acme.test", UserRole::Viewer).await;

    let unknown = app
        .runtime
        .sessions
        .login("nobody@acme.test", PASSWORD)
        .await
        .unwrap_err();
    let wrong = app
        .runtime
        .sessions
        .login("d@acme.test", "Wrong@999")
        .await
        .unwrap_err();

    assert_eq!(unknown.to_response(), wrong.to_response());
}

#[tokio::test]
async fn test_inactive_and_suspended_identities_are_gated() {
    let app = TestApp::new().await;
    let root = app.create_superadmin("root@acme.test").await;
    let actor = app.actor(root, UserRole::SuperAdmin);

    for (email, status, expected) in [
        ("e@acme.test", UserStatus::Suspended, reason::ACCOUNT_SUSPENDED),
        ("f@acme.test", UserStatus::Inactive, reason::ACCOUNT_INACTIVE),
    ] {
        let outcome = app.register(email, UserRole::Viewer).await;
        let refresh = outcome.tokens.refresh_token;
        app.runtime
            .accounts
            .change_status(&actor, outcome.identity.id, status, Some("policy"))
            .await
            .unwrap();

        let err = app.runtime.sessions.login(email, PASSWORD).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Forbidden);
        assert_eq!(err.reason, Some(expected));

        assert!(app.runtime.sessions.refresh(&refresh).await.is_err());
        assert!(
            !app.runtime
                .sessions
                .verify_session_validity(outcome.identity.id)
                .await
                .unwrap()
        );
    }
}

#[tokio::test]
async fn test_inactive_tenant_blocks_login_refresh_and_gate() {
    let app = TestApp::new().await;
    let outcome = app.register("g@acme.test", UserRole::Viewer).await;

    app.runtime
        .accounts
        .set_tenant_active(app.tenant_id, false)
        .await
        .unwrap();

    let err = app.runtime.sessions.login("g@acme.test", PASSWORD).await.unwrap_err();
    assert_eq!(err.reason, Some(reason::TENANT_INACTIVE));

    let err = app
        .runtime
        .sessions
        .refresh(&outcome.tokens.refresh_token)
        .await
        .unwrap_err();
    assert_eq!(err.reason, Some(reason::TENANT_INACTIVE));

    let header = TestApp::bearer(&outcome.tokens.access_token);
    let err = app
        .runtime
        .auth_gate
        .authenticate(Some(&header))
        .await
        .unwrap_err();
    assert_eq!(err.reason, Some(reason::TENANT_INACTIVE));
}

#[tokio::test]
async fn test_concurrent_refreshes_one_winner() {
    let app = TestApp::new().await;
    let outcome = app.register("h@acme.test", UserRole::Viewer).await;
    let token = outcome.tokens.refresh_token;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let sessions = app.runtime.sessions.clone();
        let token = token.clone();
        handles.push(tokio::spawn(async move { sessions.refresh(&token).await }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(e) => assert_eq!(e.kind, ErrorKind::Unauthorized),
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn test_change_password_forces_reauthentication() {
    let app = TestApp::new().await;
    let outcome = app.register("i@acme.test", UserRole::Viewer).await;

    app.runtime
        .sessions
        .change_password(outcome.identity.id, PASSWORD, "Fresh@2024")
        .await
        .unwrap();

    let err = app
        .runtime
        .sessions
        .refresh(&outcome.tokens.refresh_token)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Unauthorized);

    assert!(app.runtime.sessions.login("i@acme.test", "Fresh@2024").await.is_ok());
}

#[tokio::test]
async fn test_bearer_header_errors_are_distinct() {
    let app = TestApp::new().await;
    let gate = &app.runtime.auth_gate;

    let missing = gate.authenticate(None).await.unwrap_err();
    assert_eq!(missing.reason, Some(reason::MISSING_AUTH_HEADER));

    let malformed = gate.authenticate(Some("Token abc")).await.unwrap_err();
    assert_eq!(malformed.reason, Some(reason::MALFORMED_AUTH_HEADER));

    let invalid = gate.authenticate(Some("Bearer abc.def.ghi")).await.unwrap_err();
    assert_eq!(invalid.kind, ErrorKind::TokenInvalid);

    let outcome = app.register("j@acme.test", UserRole::Viewer).await;
    let header = TestApp::bearer(&outcome.tokens.refresh_token);
    let wrong_profile = gate.authenticate(Some(&header)).await.unwrap_err();
    assert_eq!(wrong_profile.kind, ErrorKind::TokenInvalid);
}
