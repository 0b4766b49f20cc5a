//! Integration tests for admin authentication.
//!
//! Tests account bootstrap, login and token expiry against the in-memory store.

use bracketeer::auth::{AuthError, AuthManager};
use bracketeer::db::MemoryStore;
use std::sync::Arc;

/// Helper to create test auth manager
fn setup_auth_manager() -> AuthManager {
    AuthManager::new(
        Arc::new(MemoryStore::new()),
        "test_pepper_value".to_string(),
        "test_secret_key_for_jwt_0123456789abcdef".to_string(),
    )
}

#[tokio::test]
async fn test_ensure_admin_is_idempotent() {
    let auth = setup_auth_manager();

    assert!(auth.ensure_admin("organizer", "SecurePass123").await.unwrap());
    assert!(!auth.ensure_admin("organizer", "OtherPass456").await.unwrap());

    // The original password still works
    assert!(auth.login("organizer", "SecurePass123").await.is_ok());
    assert!(matches!(
        auth.login("organizer", "OtherPass456").await,
        Err(AuthError::InvalidCredentials)
    ));
}

#[tokio::test]
async fn test_ensure_admin_still_validates() {
    let auth = setup_auth_manager();

    let result = auth.ensure_admin("organizer", "weak").await;
    assert!(matches!(result, Err(AuthError::WeakPassword(_))));
}

#[tokio::test]
async fn test_login_records_last_login() {
    let auth = setup_auth_manager();
    let admin = auth.create_admin("organizer", "SecurePass123").await.unwrap();
    assert!(admin.last_login.is_none());

    let (logged_in, token) = auth.login("organizer", "SecurePass123").await.unwrap();
    assert_eq!(logged_in.id, admin.id);
    assert!(logged_in.last_login.is_some());

    let claims = auth.verify_access_token(&token).unwrap();
    assert_eq!(claims.username, "organizer");
    assert!(claims.exp > claims.iat);
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let auth = setup_auth_manager().with_token_lifetime(-2);
    auth.create_admin("organizer", "SecurePass123").await.unwrap();

    let (_, token) = auth.login("organizer", "SecurePass123").await.unwrap();
    assert!(matches!(
        auth.verify_access_token(&token),
        Err(AuthError::JwtError(_))
    ));
}

#[tokio::test]
async fn test_pepper_is_part_of_the_hash() {
    let store = Arc::new(MemoryStore::new());
    let auth = AuthManager::new(
        store.clone(),
        "first_pepper_value".to_string(),
        "test_secret_key_for_jwt_0123456789abcdef".to_string(),
    );
    auth.create_admin("organizer", "SecurePass123").await.unwrap();

    let repeppered = AuthManager::new(
        store,
        "other_pepper_value".to_string(),
        "test_secret_key_for_jwt_0123456789abcdef".to_string(),
    );
    assert!(matches!(
        repeppered.login("organizer", "SecurePass123").await,
        Err(AuthError::InvalidCredentials)
    ));
}

#[tokio::test]
async fn test_concurrent_creation_yields_one_account() {
    let auth = setup_auth_manager();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let auth = auth.clone();
        handles.push(tokio::spawn(async move {
            auth.create_admin("organizer", "SecurePass123").await
        }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(AuthError::UsernameTaken) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(created, 1);
}
