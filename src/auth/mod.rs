/// Authentication module
///
/// Password verification, JWT issuance/validation, refresh session binding,
/// cookie transport, and the session lifecycle built from them.

mod claims;
mod jwt;
mod password;
mod refresh_token;
pub mod cookies;
mod session;

pub use claims::{AccessClaims, RefreshClaims};
pub use jwt::{
    generate_access_token, generate_refresh_token, issue_token_pair, validate_access_token,
    validate_refresh_token, IssuedTokens,
};
pub use password::{hash_password, verify_password, MAX_HASH_COST, MIN_HASH_COST};
pub use refresh_token::{hash_token, session_for, session_matches};
pub use session::{Credentials, LoginOutcome, SessionManager};
