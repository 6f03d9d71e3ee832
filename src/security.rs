//! Security utilities covering HTTPS enforcement, one-time secret generation, and log-safe
//! fingerprints.
//!
//! # Threat Model
//! State tokens, nonces, and session ids are bearer secrets: whoever holds one can complete a
//! login or act as the user. They are drawn from the thread-local CSPRNG, compared in constant
//! time, and only ever logged through [`fingerprint`].

// crates.io
use base64::prelude::*;
use rand::Rng;
use sha2::{Digest, Sha256};
use url::Url;
// self
use crate::_prelude::*;

/// Entropy behind every state token, nonce, and session id.
pub const TOKEN_BYTES: usize = 32;

/// Generate a URL-safe random token carrying [`TOKEN_BYTES`] of entropy.
pub fn random_token() -> String {
	let mut bytes = [0u8; TOKEN_BYTES];

	rand::rng().fill(&mut bytes);

	BASE64_URL_SAFE_NO_PAD.encode(bytes)
}

/// Short, non-reversible identifier for correlating a secret across log lines.
pub fn fingerprint(secret: &str) -> String {
	let digest = Sha256::digest(secret.as_bytes());

	BASE64_URL_SAFE_NO_PAD.encode(&digest[..8])
}

/// Ensure the provided URL uses HTTPS.
pub fn enforce_https(url: &Url) -> Result<()> {
	if url.scheme() == "https" {
		Ok(())
	} else {
		Err(Error::Security(format!("Upstream URL {url} must use HTTPS.")))
	}
}
