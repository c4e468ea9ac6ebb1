use axum::http::{HeaderMap, HeaderValue, header};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::{sync::Arc, time::SystemTime};
use tiered_rpc::{
    auth::{
        Claims, DEV_USER_HEADER, JwtSessionResolver, SESSION_COOKIE, SessionResolver,
        create_context,
    },
    config::{AppConfig, NodeEnv},
    models::{Permission, User},
    repository::{InMemoryRepository, RepositoryState},
};
use uuid::Uuid;

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";
const TEST_USER_ID: Uuid = Uuid::from_u128(1);

fn now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

fn create_token(user_id: Uuid, iat: u64, exp: u64) -> String {
    let claims = Claims {
        sub: user_id,
        iat: iat as usize,
        exp: exp as usize,
    };
    let key = EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

fn valid_token(user_id: Uuid) -> String {
    create_token(user_id, now(), now() + 3600)
}

fn test_user(permission: Permission) -> User {
    User {
        id: TEST_USER_ID,
        email: "test@example.com".to_string(),
        name: Some("Test".to_string()),
        permission,
    }
}

fn create_resolver(node_env: NodeEnv, users: Vec<User>) -> JwtSessionResolver {
    let config = AppConfig {
        node_env,
        jwt_secret: TEST_JWT_SECRET.to_string(),
        ..AppConfig::default()
    };
    let repo: RepositoryState = Arc::new(InMemoryRepository::with_users(users));
    JwtSessionResolver::new(repo, &config)
}

fn bearer(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
    headers
}

// --- Tests ---

#[tokio::test]
async fn test_session_with_valid_jwt() {
    let resolver = create_resolver(NodeEnv::Production, vec![test_user(Permission::Moderator)]);

    let session = resolver
        .resolve(&bearer(&valid_token(TEST_USER_ID)))
        .await
        .unwrap()
        .expect("session present");

    let user = session.user.expect("user present");
    assert_eq!(user.id, TEST_USER_ID);
    assert_eq!(user.permission, Permission::Moderator);
    assert!(session.expires > chrono::Utc::now());
}

#[tokio::test]
async fn test_session_from_cookie() {
    let resolver = create_resolver(NodeEnv::Production, vec![test_user(Permission::User)]);

    let mut headers = HeaderMap::new();
    headers.insert(
        header::COOKIE,
        HeaderValue::from_str(&format!(
            "theme=dark; {}={}",
            SESSION_COOKIE,
            valid_token(TEST_USER_ID)
        ))
        .unwrap(),
    );

    let session = resolver.resolve(&headers).await.unwrap();
    assert_eq!(session.and_then(|s| s.user).map(|u| u.id), Some(TEST_USER_ID));
}

#[tokio::test]
async fn test_session_cookie_among_others() {
    let resolver = create_resolver(NodeEnv::Production, vec![test_user(Permission::User)]);

    let mut headers = HeaderMap::new();
    headers.append(header::COOKIE, HeaderValue::from_static("theme=dark"));
    headers.append(
        header::COOKIE,
        HeaderValue::from_str(&format!(
            "{}={}; lang=en",
            SESSION_COOKIE,
            valid_token(TEST_USER_ID)
        ))
        .unwrap(),
    );

    let session = resolver.resolve(&headers).await.unwrap();
    assert_eq!(session.and_then(|s| s.user).map(|u| u.id), Some(TEST_USER_ID));

    // A cookie whose name merely contains the session name is ignored.
    let mut headers = HeaderMap::new();
    headers.insert(
        header::COOKIE,
        HeaderValue::from_str(&format!("x-{}={}", SESSION_COOKIE, valid_token(TEST_USER_ID)))
            .unwrap(),
    );
    assert!(resolver.resolve(&headers).await.unwrap().is_none());
}

#[tokio::test]
async fn test_no_credentials_is_anonymous() {
    let resolver = create_resolver(NodeEnv::Production, vec![test_user(Permission::Admin)]);

    let ctx = create_context(&resolver, &HeaderMap::new()).await.unwrap();
    assert!(ctx.session.is_none());
}

#[tokio::test]
async fn test_bad_tokens_are_anonymous() {
    let resolver = create_resolver(NodeEnv::Production, vec![test_user(Permission::Admin)]);

    let expired = create_token(TEST_USER_ID, now() - 7200, now() - 3600);
    assert!(resolver.resolve(&bearer(&expired)).await.unwrap().is_none());

    assert!(resolver.resolve(&bearer("not-a-jwt")).await.unwrap().is_none());

    let forged = encode(
        &Header::default(),
        &Claims {
            sub: TEST_USER_ID,
            iat: now() as usize,
            exp: (now() + 3600) as usize,
        },
        &EncodingKey::from_secret(b"some-other-secret"),
    )
    .unwrap();
    assert!(resolver.resolve(&bearer(&forged)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_out_of_range_expiry_is_anonymous() {
    let resolver = create_resolver(NodeEnv::Production, vec![test_user(Permission::Admin)]);

    // Beyond i64, and within i64 but beyond any representable date.
    for exp in [u64::MAX, i64::MAX as u64] {
        let token = create_token(TEST_USER_ID, now(), exp);
        let ctx = create_context(&resolver, &bearer(&token)).await.unwrap();
        assert!(ctx.session.is_none(), "exp {} must not yield a session", exp);
    }
}

#[tokio::test]
async fn test_valid_token_for_unknown_user_has_no_user() {
    let resolver = create_resolver(NodeEnv::Production, vec![]);

    let session = resolver
        .resolve(&bearer(&valid_token(Uuid::new_v4())))
        .await
        .unwrap()
        .expect("session present");
    assert!(session.user.is_none());
}

#[tokio::test]
async fn test_dev_header_login() {
    let resolver = create_resolver(NodeEnv::Development, vec![test_user(Permission::Admin)]);

    let mut headers = HeaderMap::new();
    headers.insert(
        DEV_USER_HEADER,
        HeaderValue::from_str(&TEST_USER_ID.to_string()).unwrap(),
    );

    let ctx = create_context(&resolver, &headers).await.unwrap();
    let user = ctx.user().expect("dev login resolves the user");
    assert_eq!(user.permission, Permission::Admin);
}

#[tokio::test]
async fn test_dev_header_disabled_outside_development() {
    for node_env in [NodeEnv::Production, NodeEnv::Test] {
        let resolver = create_resolver(node_env, vec![test_user(Permission::Admin)]);

        let mut headers = HeaderMap::new();
        headers.insert(
            DEV_USER_HEADER,
            HeaderValue::from_str(&TEST_USER_ID.to_string()).unwrap(),
        );

        let session = resolver.resolve(&headers).await.unwrap();
        assert!(session.is_none(), "{:?} must ignore the dev header", node_env);
    }
}
