//! Issuer, audience, and expiry checks for decoded ID tokens.

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	clock::Clock,
	oidc::{
		claims::{Audience, IdTokenClaims},
		metadata::ProviderMetadata,
	},
};

/// Reason an ID token was rejected.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ClaimError {
	/// `iss` is absent or differs from the discovered issuer.
	#[error("Issuer mismatch: expected '{expected}', found {found:?}.")]
	Issuer {
		/// Discovered issuer.
		expected: String,
		/// Issuer in the token.
		found: Option<String>,
	},
	/// `aud` does not name this client.
	#[error("Audience {found} does not include client '{client_id}'.")]
	Audience {
		/// Configured client id.
		client_id: String,
		/// JSON rendering of the `aud` claim.
		found: String,
	},
	/// `exp` lies in the past.
	#[error("ID token expired at {expired_at}, now {now}.")]
	Expired {
		/// Token expiry in epoch seconds.
		expired_at: i64,
		/// Validation time in epoch seconds.
		now: i64,
	},
	/// `exp` is absent or not numeric.
	#[error("ID token has no numeric 'exp' claim.")]
	MissingExpiry,
}

/// Validates decoded claims against provider metadata and the client id.
#[derive(Clone, Debug)]
pub struct IdTokenValidator {
	clock: Arc<dyn Clock>,
}
impl IdTokenValidator {
	/// Create a validator reading time from `clock`.
	pub fn new(clock: Arc<dyn Clock>) -> Self {
		Self { clock }
	}

	/// Check issuer, then audience, then expiry; the first failing rule is reported.
	///
	/// A token whose `exp` equals the current second is still accepted.
	pub fn validate(
		&self,
		claims: &IdTokenClaims,
		metadata: &ProviderMetadata,
		client_id: &str,
	) -> std::result::Result<(), ClaimError> {
		if claims.issuer() != Some(metadata.issuer.as_str()) {
			return Err(ClaimError::Issuer {
				expected: metadata.issuer.clone(),
				found: claims.issuer().map(str::to_owned),
			});
		}

		let audience = claims.audience();

		if !audience.contains(client_id) {
			let found = match audience {
				Audience::Single(aud) => Value::from(aud).to_string(),
				Audience::Multiple(values) => Value::from(values.to_vec()).to_string(),
				Audience::Invalid(value) => value.to_string(),
				Audience::Missing => "null".into(),
			};

			return Err(ClaimError::Audience { client_id: client_id.to_owned(), found });
		}

		let expired_at = claims.expires_at().ok_or(ClaimError::MissingExpiry)?;
		let now = self.clock.now().timestamp();

		if expired_at < now {
			return Err(ClaimError::Expired { expired_at, now });
		}

		tracing::debug!(
			issuer = %metadata.issuer,
			subject = ?claims.subject(),
			expires_in = expired_at - now,
			"id token claims accepted"
		);

		Ok(())
	}
}
