//! Authentication manager implementation.

use super::{
    errors::{AuthError, AuthResult},
    models::{AccessTokenClaims, Admin, AdminId},
};
use crate::db::repository::AdminRepository;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use std::sync::Arc;

/// Default access token lifetime in hours
pub const DEFAULT_TOKEN_LIFETIME_HOURS: i64 = 12;

/// Authentication manager
#[derive(Clone)]
pub struct AuthManager {
    repo: Arc<dyn AdminRepository>,
    pepper: String,
    jwt_secret: String,
    access_token_duration: Duration,
}

impl AuthManager {
    /// Create a new authentication manager
    ///
    /// # Arguments
    ///
    /// * `repo` - Admin account storage
    /// * `pepper` - Server-side pepper for password hashing
    /// * `jwt_secret` - Secret key for JWT signing
    pub fn new(repo: Arc<dyn AdminRepository>, pepper: String, jwt_secret: String) -> Self {
        Self {
            repo,
            pepper,
            jwt_secret,
            access_token_duration: Duration::hours(DEFAULT_TOKEN_LIFETIME_HOURS),
        }
    }

    /// Override the access token lifetime
    pub fn with_token_lifetime(mut self, hours: i64) -> Self {
        self.access_token_duration = Duration::hours(hours);
        self
    }

    /// Create an admin account
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidUsername` - Username format invalid
    /// * `AuthError::WeakPassword` - Password too weak
    /// * `AuthError::UsernameTaken` - Username already exists
    pub async fn create_admin(&self, username: &str, password: &str) -> AuthResult<Admin> {
        self.validate_username(username)?;
        self.validate_password(password)?;

        if self.repo.find_by_username(username).await?.is_some() {
            return Err(AuthError::UsernameTaken);
        }

        let password_hash = self.hash_password(password)?;
        let admin = self.repo.create_admin(username, &password_hash).await?;

        log::info!("Created admin account '{}'", admin.username);
        Ok(admin)
    }

    /// Create the account unless it already exists; returns whether it was created
    pub async fn ensure_admin(&self, username: &str, password: &str) -> AuthResult<bool> {
        match self.create_admin(username, password).await {
            Ok(_) => Ok(true),
            Err(AuthError::UsernameTaken) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Log in and issue an access token
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidCredentials` - Unknown user or wrong password
    /// * `AuthError::AccountDisabled` - Account deactivated
    pub async fn login(&self, username: &str, password: &str) -> AuthResult<(Admin, String)> {
        let credentials = self
            .repo
            .find_by_username(username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        self.verify_password(password, &credentials.password_hash)?;

        if !credentials.admin.is_active {
            return Err(AuthError::AccountDisabled);
        }

        self.repo.update_last_login(credentials.admin.id).await?;

        let admin = Admin {
            last_login: Some(Utc::now()),
            ..credentials.admin
        };
        let token = self.generate_access_token(admin.id, &admin.username)?;

        Ok((admin, token))
    }

    /// Verify an access token
    ///
    /// # Returns
    ///
    /// * `AuthResult<AccessTokenClaims>` - Decoded claims or error
    pub fn verify_access_token(&self, token: &str) -> AuthResult<AccessTokenClaims> {
        let token_data = decode::<AccessTokenClaims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )?;

        Ok(token_data.claims)
    }

    /// Hash password with Argon2id + pepper
    fn hash_password(&self, password: &str) -> AuthResult<String> {
        let peppered = format!("{}{}", password, self.pepper);
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        Ok(argon2
            .hash_password(peppered.as_bytes(), &salt)
            .map_err(|_| AuthError::HashingFailed)?
            .to_string())
    }

    /// Verify password against hash
    fn verify_password(&self, password: &str, hash: &str) -> AuthResult<()> {
        let peppered = format!("{}{}", password, self.pepper);
        let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
        let argon2 = Argon2::default();

        argon2
            .verify_password(peppered.as_bytes(), &parsed_hash)
            .map_err(|_| AuthError::InvalidCredentials)
    }

    fn generate_access_token(&self, admin_id: AdminId, username: &str) -> AuthResult<String> {
        let now = Utc::now();
        let claims = AccessTokenClaims {
            sub: admin_id,
            username: username.to_string(),
            exp: (now + self.access_token_duration).timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )?;

        Ok(token)
    }

    /// Validate username format
    fn validate_username(&self, username: &str) -> AuthResult<()> {
        let len = username.len();
        if !(3..=20).contains(&len) {
            return Err(AuthError::InvalidUsername(
                "Username must be 3-20 characters".to_string(),
            ));
        }

        if !username.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(AuthError::InvalidUsername(
                "Username can only contain letters, numbers, and underscores".to_string(),
            ));
        }

        Ok(())
    }

    /// Validate password strength
    fn validate_password(&self, password: &str) -> AuthResult<()> {
        if password.len() < 8 {
            return Err(AuthError::WeakPassword(
                "Password must be at least 8 characters".to_string(),
            ));
        }

        let has_digit = password.chars().any(|c| c.is_ascii_digit());
        let has_uppercase = password.chars().any(|c| c.is_ascii_uppercase());
        let has_lowercase = password.chars().any(|c| c.is_ascii_lowercase());

        if !has_digit || !has_uppercase || !has_lowercase {
            return Err(AuthError::WeakPassword(
                "Password must contain at least one number, one uppercase and one lowercase letter"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    fn manager() -> AuthManager {
        AuthManager::new(
            Arc::new(MemoryStore::new()),
            "test_pepper_value".to_string(),
            "test_jwt_secret_that_is_long_enough".to_string(),
        )
    }

    #[tokio::test]
    async fn test_login_issues_verifiable_token() {
        let auth = manager();
        auth.create_admin("organizer", "SecurePass123").await.unwrap();

        let (admin, token) = auth.login("organizer", "SecurePass123").await.unwrap();
        assert!(admin.last_login.is_some());

        let claims = auth.verify_access_token(&token).unwrap();
        assert_eq!(claims.sub, admin.id);
        assert_eq!(claims.username, "organizer");
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_user_look_the_same() {
        let auth = manager();
        auth.create_admin("organizer", "SecurePass123").await.unwrap();

        let wrong = auth.login("organizer", "WrongPass123").await.unwrap_err();
        let unknown = auth.login("nobody", "SecurePass123").await.unwrap_err();
        assert_eq!(wrong.client_message(), unknown.client_message());
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let auth = manager();
        auth.create_admin("organizer", "SecurePass123").await.unwrap();
        assert!(matches!(
            auth.create_admin("organizer", "OtherPass456").await,
            Err(AuthError::UsernameTaken)
        ));
        assert!(!auth.ensure_admin("organizer", "SecurePass123").await.unwrap());
    }

    #[tokio::test]
    async fn test_validation() {
        let auth = manager();
        assert!(matches!(
            auth.create_admin("ab", "SecurePass123").await,
            Err(AuthError::InvalidUsername(_))
        ));
        assert!(matches!(
            auth.create_admin("organizer", "alllowercase1").await,
            Err(AuthError::WeakPassword(_))
        ));
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let auth = manager();
        let other = AuthManager::new(
            Arc::new(MemoryStore::new()),
            "test_pepper_value".to_string(),
            "a_completely_different_jwt_secret!!".to_string(),
        );
        let token = other.generate_access_token(1, "organizer").unwrap();
        assert!(matches!(
            auth.verify_access_token(&token),
            Err(AuthError::JwtError(_))
        ));
    }
}
