//! # leadforge-auth
//!
//! Authentication primitives for leadforge.
//!
//! - **Passwords**: Argon2id, stored as PHC strings
//! - **Access tokens**: HS256 JWTs carrying the user, company, and role
//! - **Refresh tokens**: opaque `lf_rt_` strings, stored as SHA-256 hex
//!
//! ## Examples
//!
//! ```rust
//! use leadforge_auth::{JwtKeys, PasswordHasherService, HashParams};
//! use leadforge_core::{Principal, UserRole};
//! use uuid::Uuid;
//!
//! let hasher = PasswordHasherService::new(HashParams::insecure_fast());
//! let hash = hasher.hash("correct horse battery").unwrap();
//! assert!(hasher.verify("correct horse battery", &hash).unwrap());
//!
//! let keys = JwtKeys::new(b"an-hs256-secret-of-at-least-32-bytes", "leadforge", 900).unwrap();
//! let principal = Principal { user_id: Uuid::nil(), company_id: Uuid::nil(), role: UserRole::Owner };
//! let token = keys.issue(&principal).unwrap();
//! assert_eq!(keys.verify(&token).unwrap().principal(), principal);
//! ```

pub mod error;
pub mod jwt;
pub mod password;
pub mod tokens;

pub use error::{AuthError, AuthResult};
pub use jwt::{Claims, JwtKeys};
pub use password::{validate_password, HashParams, PasswordHasherService, MIN_PASSWORD_LENGTH};
pub use tokens::{generate_refresh_token, hash_presented_token, hash_token, RefreshToken};
