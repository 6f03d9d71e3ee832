//! OpenID Connect protocol pieces: discovery metadata, authorization redirects, code exchange,
//! and ID token claims.

pub mod authorize;
pub mod claims;
pub mod exchange;
pub mod metadata;
pub mod validation;
