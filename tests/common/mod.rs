#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use quillgate::credentials::{Credentials, NewUser};
use quillgate::db::{Database, User, UserRole};
use quillgate::jwt::JwtConfig;
use quillgate::{ServerConfig, create_app};
use tower::ServiceExt;

pub const TEST_SECRET: &[u8] = b"test-jwt-secret-for-integration-tests";

/// Strong enough to pass the password policy.
pub const PASSWORD: &str = "Secret123!";

/// Lowest cost bcrypt accepts, to keep tests fast.
pub const TEST_BCRYPT_COST: u32 = 4;

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub jwt: JwtConfig,
    pub credentials: Credentials,
}

pub async fn create_test_app() -> TestApp {
    create_test_app_with_rate(1000).await
}

pub async fn create_test_app_with_rate(login_rate_per_minute: u32) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let config = ServerConfig {
        db: db.clone(),
        jwt_secret: TEST_SECRET.to_vec(),
        secure_cookies: false,
        trust_proxy: false,
        login_rate_per_minute,
        bcrypt_cost: TEST_BCRYPT_COST,
    };
    TestApp {
        app: create_app(&config),
        credentials: Credentials::new(db.clone(), TEST_BCRYPT_COST),
        jwt: JwtConfig::new(TEST_SECRET),
        db,
    }
}

/// Tokens returned by a successful login.
pub struct Session {
    pub access: String,
    pub refresh: String,
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    /// Insert a user directly through the credential store.
    pub async fn create_user(&self, username: &str, role: UserRole) -> User {
        let uuid = uuid::Uuid::new_v4().to_string();
        let email = format!("{}@example.com", username);
        let id = self
            .credentials
            .register(
                NewUser {
                    uuid: &uuid,
                    username,
                    email: &email,
                    role,
                },
                PASSWORD,
            )
            .await
            .expect("Failed to create user");
        self.db
            .users()
            .get_by_id(id)
            .await
            .unwrap()
            .expect("user just created")
    }

    pub async fn login(&self, username: &str, password: &str) -> Response<Body> {
        self.send(json_request(
            "POST",
            "/api/auth/login",
            serde_json::json!({"username": username, "password": password}),
        ))
        .await
    }

    /// Log in and return both tokens, asserting success.
    pub async fn login_ok(&self, username: &str, password: &str) -> Session {
        let response = self.login(username, password).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        Session {
            access: json["access_token"].as_str().unwrap().to_string(),
            refresh: json["refresh_token"].as_str().unwrap().to_string(),
        }
    }

    /// Make every insert into the revocation table fail. Lookups keep working.
    pub async fn break_revocation_writes(&self) {
        sqlx::query(
            "CREATE TRIGGER block_revocations BEFORE INSERT ON revoked_tokens
             BEGIN SELECT RAISE(ABORT, 'revocation store read-only'); END",
        )
        .execute(self.db.pool())
        .await
        .expect("Failed to create trigger");
    }

    /// Create a user and log in as them.
    pub async fn user_session(&self, username: &str, role: UserRole) -> (User, Session) {
        let user = self.create_user(username, role).await;
        let session = self.login_ok(username, PASSWORD).await;
        (user, session)
    }
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn authed_json_request(
    method: &str,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn authed_request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

pub fn cookie_request(method: &str, uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// All `Set-Cookie` header values of a response.
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// Decode a JWT payload without verifying it.
pub fn decode_payload(token: &str) -> serde_json::Value {
    let payload = token.split('.').nth(1).expect("token has a payload");
    let bytes = URL_SAFE_NO_PAD.decode(payload).expect("payload is base64url");
    serde_json::from_slice(&bytes).expect("payload is JSON")
}

/// Assert the standard error shape and return the parsed body.
pub async fn assert_error(
    response: Response<Body>,
    status: StatusCode,
    error_code: &str,
) -> serde_json::Value {
    assert_eq!(response.status(), status);
    let json = body_json(response).await;
    assert_eq!(json["status_code"], status.as_u16());
    assert_eq!(json["error_code"], error_code);
    assert!(json["message"].is_string());
    json
}
