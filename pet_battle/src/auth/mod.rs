//! Access token verification.
//!
//! Accounts and token issuance live in the platform's account service. This
//! module only checks the HS256 access tokens it hands out and extracts the
//! role they belong to.
//!
//! ## Example
//!
//! ```
//! use pet_battle::auth::TokenVerifier;
//!
//! let verifier = TokenVerifier::new("jwt_secret".to_string());
//! let token = verifier.issue(42, chrono::Duration::minutes(15)).unwrap();
//! let claims = verifier.verify(&token).unwrap();
//! assert_eq!(claims.sub, 42);
//! ```

pub mod errors;
pub mod models;
pub mod verifier;

pub use errors::{AuthError, AuthResult};
pub use models::AccessTokenClaims;
pub use verifier::TokenVerifier;
