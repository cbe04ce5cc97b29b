//! Tests for the admin API endpoints.

mod common;

use axum::http::StatusCode;
use common::*;
use quillgate::db::UserRole;

#[tokio::test]
async fn test_list_users_includes_admin_fields() {
    let t = create_test_app().await;
    let (_, admin) = t.user_session("admin", UserRole::Admin).await;
    t.create_user("alice", UserRole::User).await;

    let response = t
        .send(authed_request("GET", "/api/admin/users", &admin.access))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let users = json.as_array().unwrap();
    assert_eq!(users.len(), 2);

    let alice = users.iter().find(|u| u["username"] == "alice").unwrap();
    assert_eq!(alice["email"], "alice@example.com");
    assert_eq!(alice["role"], "user");
    assert!(alice["created_at"].is_string());
    assert!(alice["id"].as_str().unwrap().contains('-'), "public UUID, not row id");
    assert!(alice.get("password_hash").is_none());
}

#[tokio::test]
async fn test_set_role_applies_to_new_tokens() {
    let t = create_test_app().await;
    let (_, admin) = t.user_session("admin", UserRole::Admin).await;
    let alice = t.create_user("alice", UserRole::User).await;

    let response = t
        .send(authed_json_request(
            "PUT",
            &format!("/api/admin/users/{}/role", alice.uuid),
            &admin.access,
            serde_json::json!({"role": "editor"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["role"], "editor");

    let session = t.login_ok("alice", PASSWORD).await;
    assert_eq!(
        decode_payload(&session.access)["roles"],
        serde_json::json!(["editor"])
    );
    let response = t.send(authed_request("GET", "/api/users", &session.access)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_set_role_rejects_unknown_role() {
    let t = create_test_app().await;
    let (_, admin) = t.user_session("admin", UserRole::Admin).await;
    let alice = t.create_user("alice", UserRole::User).await;

    let response = t
        .send(authed_json_request(
            "PUT",
            &format!("/api/admin/users/{}/role", alice.uuid),
            &admin.access,
            serde_json::json!({"role": "superuser"}),
        ))
        .await;
    let json = assert_error(response, StatusCode::BAD_REQUEST, "VALIDATION_ERROR").await;
    assert!(json["details"]["role"].is_array());

    let stored = t.db.users().get_by_id(alice.id).await.unwrap().unwrap();
    assert_eq!(stored.role, UserRole::User);
}

#[tokio::test]
async fn test_set_role_missing_user() {
    let t = create_test_app().await;
    let (_, admin) = t.user_session("admin", UserRole::Admin).await;

    let response = t
        .send(authed_json_request(
            "PUT",
            "/api/admin/users/00000000-0000-4000-8000-000000000000/role",
            &admin.access,
            serde_json::json!({"role": "admin"}),
        ))
        .await;
    assert_error(response, StatusCode::NOT_FOUND, "NOT_FOUND").await;
}

#[tokio::test]
async fn test_editor_cannot_set_roles() {
    let t = create_test_app().await;
    let (editor_user, editor) = t.user_session("editor", UserRole::Editor).await;

    let response = t
        .send(authed_json_request(
            "PUT",
            &format!("/api/admin/users/{}/role", editor_user.uuid),
            &editor.access,
            serde_json::json!({"role": "admin"}),
        ))
        .await;
    assert_error(response, StatusCode::FORBIDDEN, "FORBIDDEN").await;
}

#[tokio::test]
async fn test_admin_revokes_token() {
    let t = create_test_app().await;
    let (_, admin) = t.user_session("admin", UserRole::Admin).await;
    let (_, alice) = t.user_session("alice", UserRole::User).await;

    let response = t
        .send(authed_json_request(
            "POST",
            "/api/admin/tokens/revoke",
            &admin.access,
            serde_json::json!({"token": alice.access}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["newly_revoked"], true);
    assert_eq!(json["jti"], decode_payload(&alice.access)["jti"]);

    let response = t.send(authed_request("GET", "/api/auth/me", &alice.access)).await;
    let json = assert_error(response, StatusCode::UNAUTHORIZED, "UNAUTHORIZED").await;
    assert_eq!(json["message"], "Token has been revoked");

    // Second revocation is a no-op
    let response = t
        .send(authed_json_request(
            "POST",
            "/api/admin/tokens/revoke",
            &admin.access,
            serde_json::json!({"token": alice.access}),
        ))
        .await;
    assert_eq!(body_json(response).await["newly_revoked"], false);
    assert_eq!(t.db.revocations().count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_admin_revoke_rejects_garbage() {
    let t = create_test_app().await;
    let (_, admin) = t.user_session("admin", UserRole::Admin).await;

    let response = t
        .send(authed_json_request(
            "POST",
            "/api/admin/tokens/revoke",
            &admin.access,
            serde_json::json!({"token": "not.a.token"}),
        ))
        .await;
    assert_error(response, StatusCode::BAD_REQUEST, "BAD_REQUEST").await;
}
