//! Authentication building blocks: Argon2 password hashing, the HS256
//! bearer-token service, and the axum identity extractor.

pub mod extract;
pub mod password;
pub mod token;

pub use extract::AuthRejection;
pub use password::{hash_password, verify_password};
pub use token::{Claims, Identity, TokenError, TokenService};
