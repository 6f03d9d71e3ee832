//! ID token payload decoding and typed claim access.
//!
//! Only the payload segment is decoded. The token is received directly from the provider's token
//! endpoint over TLS, so the signature segment is carried but not verified here.

// crates.io
use base64::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
// self
use crate::_prelude::*;

/// Issuer claim.
pub const ISS: &str = "iss";
/// Subject claim.
pub const SUB: &str = "sub";
/// Audience claim.
pub const AUD: &str = "aud";
/// Expiry claim.
pub const EXP: &str = "exp";
/// Issued-at claim.
pub const IAT: &str = "iat";
/// Authentication time claim.
pub const AUTH_TIME: &str = "auth_time";
/// Nonce claim.
pub const NONCE: &str = "nonce";
/// Authentication context class claim.
pub const ACR: &str = "acr";
/// Authentication methods claim.
pub const AMR: &str = "amr";
/// Authorized party claim.
pub const AZP: &str = "azp";
/// Email claim.
pub const EMAIL: &str = "email";
/// Email verification claim.
pub const EMAIL_VERIFIED: &str = "email_verified";

/// Shape of the `aud` claim.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Audience<'a> {
	/// Single string audience.
	Single(&'a str),
	/// Array audience.
	Multiple(&'a [Value]),
	/// Claim absent.
	Missing,
	/// Claim present with an unsupported type.
	Invalid(&'a Value),
}
impl Audience<'_> {
	/// Whether `client_id` is the audience or one element of a non-empty audience array.
	pub fn contains(&self, client_id: &str) -> bool {
		match self {
			Self::Single(aud) => *aud == client_id,
			Self::Multiple(values) => values.iter().any(|value| value.as_str() == Some(client_id)),
			Self::Missing | Self::Invalid(_) => false,
		}
	}
}

/// Decoded ID token claims.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdTokenClaims(Map<String, Value>);
impl IdTokenClaims {
	/// Decode the payload of a compact `header.payload.signature` token.
	pub fn decode(id_token: &str) -> Result<Self> {
		let mut segments = id_token.split('.');
		let (Some(_header), Some(payload), Some(_signature), None) =
			(segments.next(), segments.next(), segments.next(), segments.next())
		else {
			return Err(Error::MalformedIdToken(
				"Expected three dot-separated segments.".into(),
			));
		};
		let bytes = BASE64_URL_SAFE_NO_PAD.decode(payload).map_err(|err| {
			Error::MalformedIdToken(format!("Payload is not unpadded base64url: {err}."))
		})?;
		let claims = serde_json::from_slice::<Map<String, Value>>(&bytes).map_err(|err| {
			Error::MalformedIdToken(format!("Payload is not a JSON object: {err}."))
		})?;

		Ok(Self(claims))
	}

	/// Wrap an already decoded claim map.
	pub fn from_map(claims: Map<String, Value>) -> Self {
		Self(claims)
	}

	/// Raw claim by name, for extension claims without a typed accessor.
	pub fn get(&self, name: &str) -> Option<&Value> {
		self.0.get(name)
	}

	/// All claims.
	pub fn as_map(&self) -> &Map<String, Value> {
		&self.0
	}

	/// Claims as a JSON object, for persistence.
	pub fn to_value(&self) -> Value {
		Value::Object(self.0.clone())
	}

	/// `iss`, when it is a string.
	pub fn issuer(&self) -> Option<&str> {
		self.str_claim(ISS)
	}

	/// `sub`, when it is a string.
	pub fn subject(&self) -> Option<&str> {
		self.str_claim(SUB)
	}

	/// `aud` in either of its permitted shapes.
	pub fn audience(&self) -> Audience<'_> {
		match self.0.get(AUD) {
			None => Audience::Missing,
			Some(Value::String(aud)) => Audience::Single(aud),
			Some(Value::Array(values)) if !values.is_empty() => Audience::Multiple(values),
			Some(other) => Audience::Invalid(other),
		}
	}

	/// `exp` in seconds since the epoch; fractional values are truncated.
	pub fn expires_at(&self) -> Option<i64> {
		self.numeric_claim(EXP)
	}

	/// `iat` in seconds since the epoch.
	pub fn issued_at(&self) -> Option<i64> {
		self.numeric_claim(IAT)
	}

	/// `auth_time` in seconds since the epoch.
	pub fn auth_time(&self) -> Option<i64> {
		self.numeric_claim(AUTH_TIME)
	}

	/// `nonce`, when it is a string.
	pub fn nonce(&self) -> Option<&str> {
		self.str_claim(NONCE)
	}

	/// `acr`, when it is a string.
	pub fn acr(&self) -> Option<&str> {
		self.str_claim(ACR)
	}

	/// `amr` string entries.
	pub fn amr(&self) -> Vec<&str> {
		self.0
			.get(AMR)
			.and_then(Value::as_array)
			.map(|values| values.iter().filter_map(Value::as_str).collect())
			.unwrap_or_default()
	}

	/// `azp`, when it is a string.
	pub fn authorized_party(&self) -> Option<&str> {
		self.str_claim(AZP)
	}

	/// `email`, when it is a string.
	pub fn email(&self) -> Option<&str> {
		self.str_claim(EMAIL)
	}

	/// `email_verified`, accepting both booleans and `"true"`/`"false"` strings.
	pub fn email_verified(&self) -> Option<bool> {
		match self.0.get(EMAIL_VERIFIED)? {
			Value::Bool(verified) => Some(*verified),
			Value::String(raw) => raw.parse().ok(),
			_ => None,
		}
	}

	fn str_claim(&self, name: &str) -> Option<&str> {
		self.0.get(name).and_then(Value::as_str)
	}

	fn numeric_claim(&self, name: &str) -> Option<i64> {
		let value = self.0.get(name)?;

		value.as_i64().or_else(|| value.as_f64().map(|seconds| seconds as i64))
	}
}
impl From<Map<String, Value>> for IdTokenClaims {
	fn from(value: Map<String, Value>) -> Self {
		Self(value)
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn compact(payload: &Value) -> String {
		let header = BASE64_URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
		let body = BASE64_URL_SAFE_NO_PAD.encode(payload.to_string());

		format!("{header}.{body}.c2lnbmF0dXJl")
	}

	#[test]
	fn decodes_payload_and_exposes_typed_claims() {
		let token = compact(&json!({
			"iss": "https://accounts.example.com",
			"sub": "1234",
			"aud": ["clientA", "clientB"],
			"exp": 1_700_000_000.9,
			"nonce": "n-0S6",
			"email": "a@example.com",
			"email_verified": "true",
			"amr": ["pwd", 7, "mfa"],
			"hd": "example.com"
		}));
		let claims = IdTokenClaims::decode(&token).expect("token decodes");

		assert_eq!(claims.issuer(), Some("https://accounts.example.com"));
		assert_eq!(claims.subject(), Some("1234"));
		assert_eq!(claims.expires_at(), Some(1_700_000_000));
		assert_eq!(claims.nonce(), Some("n-0S6"));
		assert_eq!(claims.email_verified(), Some(true));
		assert_eq!(claims.amr(), vec!["pwd", "mfa"]);
		assert_eq!(claims.get("hd"), Some(&json!("example.com")));
		assert!(claims.audience().contains("clientB"));
		assert!(!claims.audience().contains("clientC"));
	}

	#[test]
	fn rejects_wrong_segment_count() {
		for token in ["", "a.b", "a.b.c.d"] {
			assert!(
				matches!(IdTokenClaims::decode(token), Err(Error::MalformedIdToken(_))),
				"{token:?} should be rejected"
			);
		}
	}

	#[test]
	fn rejects_invalid_base64_payload() {
		let err = IdTokenClaims::decode("eyJhbGciOiJub25lIn0.@@not-base64@@.sig")
			.expect_err("payload must be base64url");

		assert!(matches!(err, Error::MalformedIdToken(_)));
	}

	#[test]
	fn rejects_padded_payload() {
		let padded = BASE64_URL_SAFE.encode(br#"{"sub":"1"}"#);

		assert!(padded.ends_with('='));
		assert!(matches!(
			IdTokenClaims::decode(&format!("h.{padded}.s")),
			Err(Error::MalformedIdToken(_))
		));
	}

	#[test]
	fn rejects_non_object_payload() {
		let payload = BASE64_URL_SAFE_NO_PAD.encode(b"[1,2,3]");

		assert!(matches!(
			IdTokenClaims::decode(&format!("h.{payload}.s")),
			Err(Error::MalformedIdToken(_))
		));
	}

	#[test]
	fn audience_shapes_are_distinguished() {
		let empty = IdTokenClaims::from_map(
			json!({ "aud": [] }).as_object().cloned().expect("object literal"),
		);
		let numeric =
			IdTokenClaims::from_map(json!({ "aud": 5 }).as_object().cloned().expect("object literal"));

		assert!(matches!(empty.audience(), Audience::Invalid(_)));
		assert!(matches!(numeric.audience(), Audience::Invalid(_)));
		assert_eq!(IdTokenClaims::default().audience(), Audience::Missing);
	}
}
