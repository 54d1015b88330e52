//! Session validation boundary.
//!
//! Handlers depend on [`SessionValidator`] only; [`JwksCache`] is the
//! production implementation verifying Supabase JWTs.

pub mod claims;
pub mod jwks;
pub mod middleware;
pub mod session;

pub use claims::Claims;
pub use jwks::JwksCache;
pub use middleware::RequireAuth;
pub use session::{Session, SessionValidator};
