//! OpenID provider metadata as published at the discovery endpoint.

// crates.io
use serde::{Deserialize, Serialize};
use url::Url;
// self
use crate::_prelude::*;

/// Parsed discovery document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetadata {
	/// Issuer identifier; ID tokens must carry it verbatim in `iss`.
	pub issuer: String,
	/// Authorization endpoint the browser is redirected to.
	pub authorization_endpoint: Url,
	/// Token endpoint used for the code exchange.
	pub token_endpoint: Url,
	/// UserInfo endpoint.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub userinfo_endpoint: Option<Url>,
	/// Signing key set location.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub jwks_uri: Option<Url>,
	/// Dynamic client registration endpoint.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub registration_endpoint: Option<Url>,
	/// RP-initiated logout endpoint.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub end_session_endpoint: Option<Url>,
	/// Token revocation endpoint.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub revocation_endpoint: Option<Url>,
	/// Human-readable provider documentation.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub service_documentation: Option<Url>,
	#[allow(missing_docs)]
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub scopes_supported: Vec<String>,
	#[allow(missing_docs)]
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub response_types_supported: Vec<String>,
	#[allow(missing_docs)]
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub response_modes_supported: Vec<String>,
	#[allow(missing_docs)]
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub grant_types_supported: Vec<String>,
	#[allow(missing_docs)]
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub subject_types_supported: Vec<String>,
	#[allow(missing_docs)]
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub id_token_signing_alg_values_supported: Vec<String>,
	#[allow(missing_docs)]
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub token_endpoint_auth_methods_supported: Vec<String>,
	#[allow(missing_docs)]
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub claims_supported: Vec<String>,
	#[allow(missing_docs)]
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub code_challenge_methods_supported: Vec<String>,
	#[allow(missing_docs)]
	#[serde(default)]
	pub claims_parameter_supported: bool,
	#[allow(missing_docs)]
	#[serde(default)]
	pub request_parameter_supported: bool,
	#[allow(missing_docs)]
	#[serde(default)]
	pub request_uri_parameter_supported: bool,
}
impl ProviderMetadata {
	/// Decode and validate a discovery document.
	pub fn from_slice(bytes: &[u8]) -> Result<Self> {
		let metadata: Self = serde_json::from_slice(bytes)?;

		metadata.validate()?;

		Ok(metadata)
	}

	/// Check the fields the login flow cannot work without.
	pub fn validate(&self) -> Result<()> {
		if self.issuer.trim().is_empty() {
			return Err(Error::Validation { field: "issuer", reason: "Must not be empty.".into() });
		}

		Ok(())
	}

	/// Whether the provider advertises the given token endpoint auth method.
	pub fn supports_auth_method(&self, method: &str) -> bool {
		self.token_endpoint_auth_methods_supported.iter().any(|m| m == method)
	}
}
