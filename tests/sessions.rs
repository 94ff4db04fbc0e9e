//! Integration tests for session validation, logout and self-service
//! session management.

use passkey_auth::domain::SessionStorage;
use serde_json::Value;

mod common;

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn validate_known_session() {
    // ---
    let server = common::TestServer::new().await;
    let (user, session_id) = server.signed_in("alice").await;

    let res = server
        .client
        .get(server.url(&format!("/validate/{session_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["valid"], true);
    assert_eq!(body["username"], "alice");
    assert_eq!(body["userId"], user.id.to_string());
    assert!(body["expires"].as_str().is_some());
}

#[tokio::test]
async fn validate_unknown_session_is_not_found() {
    // ---
    let server = common::TestServer::new().await;

    let res = server
        .client
        .get(server.url(&format!("/validate/{}", "0".repeat(64))))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "session not found");
}

#[tokio::test]
async fn validate_expired_session_is_not_found() {
    // ---
    let server = common::TestServer::new().await;
    let (_, session_id) = server.signed_in("bob").await;

    let mut session = server.storage.get_session(&session_id).await.unwrap();
    session.expires_at = chrono::Utc::now() - chrono::Duration::seconds(1);
    server.storage.save_session(&session).await.unwrap();

    let res = server
        .client
        .get(server.url(&format!("/validate/{session_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
}

// ============================================================================
// Logout
// ============================================================================

#[tokio::test]
async fn logout_ends_session_and_clears_cookie() {
    // ---
    let server = common::TestServer::new().await;
    let (_, session_id) = server.signed_in("carol").await;

    let res = server
        .client
        .post(server.url("/logout"))
        .header("X-Session-ID", &session_id)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let cookie = res
        .headers()
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(cookie.starts_with("session_id=;"));
    assert!(cookie.contains("Max-Age=0"));

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "logged_out");

    let res = server
        .client
        .get(server.url(&format!("/validate/{session_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
}

#[tokio::test]
async fn logout_is_idempotent_and_accepts_query_parameter() {
    // ---
    let server = common::TestServer::new().await;
    let (_, session_id) = server.signed_in("dave").await;

    for _ in 0..2 {
        let res = server
            .client
            .post(server.url(&format!("/logout?session_id={session_id}")))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200);
    }
}

#[tokio::test]
async fn logout_without_session_id_is_bad_request() {
    // ---
    let server = common::TestServer::new().await;

    let res = server.client.post(server.url("/logout")).send().await.unwrap();
    assert_eq!(res.status(), 400);
}

// ============================================================================
// Self-service session management
// ============================================================================

#[tokio::test]
async fn list_sessions_requires_authentication() {
    // ---
    let server = common::TestServer::new().await;

    let res = server
        .client
        .get(server.url("/user/sessions"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);
}

#[tokio::test]
async fn list_sessions_marks_current_and_hides_others() {
    // ---
    let server = common::TestServer::new().await;
    let (user, current) = server.signed_in("erin").await;
    let second = server.seed_session(&user).await;
    let _ = server.signed_in("frank").await;

    // Bearer and cookie are accepted as well as the header
    let res = server
        .client
        .get(server.url("/user/sessions"))
        .bearer_auth(&current)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["username"], "erin");

    let sessions = body["sessions"].as_array().unwrap();
    assert_eq!(sessions.len(), 2);
    for s in sessions {
        let id = s["id"].as_str().unwrap();
        assert!(id == current || id == second);
        assert_eq!(s["current"], id == current);
    }

    let res = server
        .client
        .get(server.url("/user/sessions"))
        .header("Cookie", format!("theme=dark; session_id={second}"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
}

#[tokio::test]
async fn revoke_own_session() {
    // ---
    let server = common::TestServer::new().await;
    let (user, current) = server.signed_in("grace").await;
    let other = server.seed_session(&user).await;

    let res = server
        .client
        .delete(server.url(&format!("/user/sessions/{other}")))
        .header("X-Session-ID", &current)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "deleted");

    let res = server
        .client
        .get(server.url(&format!("/validate/{other}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
}

#[tokio::test]
async fn revoke_foreign_session_is_not_found() {
    // ---
    let server = common::TestServer::new().await;
    let (_, mine) = server.signed_in("heidi").await;
    let (_, theirs) = server.signed_in("ivan").await;

    let res = server
        .client
        .delete(server.url(&format!("/user/sessions/{theirs}")))
        .header("X-Session-ID", &mine)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);

    // Still valid for its owner
    let res = server
        .client
        .get(server.url(&format!("/validate/{theirs}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
}
