//! Admin authentication.
//!
//! Only administrators log in; everything they can change (rosters, brackets,
//! results) sits behind a bearer JWT. Passwords are hashed with Argon2id and a
//! server-side pepper.
//!
//! ## Example
//!
//! ```no_run
//! use bracketeer::auth::{AuthManager, PgAdminRepository};
//! use bracketeer::db::{Database, DatabaseConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&DatabaseConfig::default()).await?;
//!     let auth = AuthManager::new(
//!         Arc::new(PgAdminRepository::new(db.pool().clone())),
//!         "secret_pepper".to_string(),
//!         "jwt_secret".to_string(),
//!     );
//!
//!     let (admin, token) = auth.login("organizer", "SecurePass123").await?;
//!     println!("{} logged in: {}", admin.username, token);
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod manager;
pub mod models;

pub use crate::db::repository::{AdminRepository, PgAdminRepository};
pub use errors::{AuthError, AuthResult};
pub use manager::AuthManager;
pub use models::{AccessTokenClaims, Admin, AdminCredentials, AdminId, LoginRequest};
