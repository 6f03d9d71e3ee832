//! Authorization-code exchange against the provider's token endpoint.

// std
use std::fmt::{Debug, Formatter, Result as FmtResult};
// crates.io
use http::header::ACCEPT;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	clock::Clock,
	config::ClientConfig,
	http::client,
	oidc::{claims::IdTokenClaims, metadata::ProviderMetadata},
	security,
};

/// How client credentials are presented to the token endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientAuthMethod {
	/// HTTP Basic authorization header.
	ClientSecretBasic,
	/// `client_id`/`client_secret` form fields.
	ClientSecretPost,
}
impl ClientAuthMethod {
	/// Prefer Basic when advertised or when nothing is advertised; fall back to form fields.
	pub fn negotiate(metadata: &ProviderMetadata) -> Self {
		if metadata.token_endpoint_auth_methods_supported.is_empty()
			|| metadata.supports_auth_method("client_secret_basic")
			|| !metadata.supports_auth_method("client_secret_post")
		{
			Self::ClientSecretBasic
		} else {
			Self::ClientSecretPost
		}
	}
}

/// Successful token endpoint response.
#[derive(Clone)]
pub struct TokenResponse {
	/// Bearer access token.
	pub access_token: String,
	/// Token type as returned by the provider.
	pub token_type: String,
	/// Refresh token, when granted.
	pub refresh_token: Option<String>,
	/// Access token expiry derived from `expires_in`.
	pub expires_at: Option<DateTime<Utc>>,
	/// Granted scopes, when the provider narrowed them.
	pub scope: Option<String>,
	/// Raw compact ID token.
	pub id_token: String,
	/// Decoded ID token payload.
	pub claims: IdTokenClaims,
	/// Provider-specific fields beyond the standard ones.
	pub extra: Map<String, Value>,
}
impl Debug for TokenResponse {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("TokenResponse")
			.field("access_token", &security::fingerprint(&self.access_token))
			.field("token_type", &self.token_type)
			.field("refresh_token", &self.refresh_token.as_deref().map(security::fingerprint))
			.field("expires_at", &self.expires_at)
			.field("scope", &self.scope)
			.field("subject", &self.claims.subject())
			.finish()
	}
}

#[derive(Deserialize)]
struct RawTokenResponse {
	access_token: String,
	token_type: String,
	#[serde(default)]
	refresh_token: Option<String>,
	#[serde(default)]
	expires_in: Option<Value>,
	#[serde(default)]
	scope: Option<String>,
	#[serde(flatten)]
	extra: Map<String, Value>,
}

/// Exchanges authorization codes for tokens.
#[derive(Clone, Debug)]
pub struct TokenExchange {
	client: Client,
	clock: Arc<dyn Clock>,
}
impl TokenExchange {
	/// Build an exchanger with the default HTTP client.
	pub fn new(clock: Arc<dyn Clock>) -> Result<Self> {
		Ok(Self::with_client(client::default_client()?, clock))
	}

	/// Build an exchanger using the supplied HTTP client (primarily for tests).
	pub fn with_client(client: Client, clock: Arc<dyn Clock>) -> Self {
		Self { client, clock }
	}

	/// Redeem `code` at the discovered token endpoint and decode the returned ID token.
	#[tracing::instrument(
		skip(self, config, metadata, code),
		fields(provider = %config.provider_id, token_endpoint = %metadata.token_endpoint)
	)]
	pub async fn exchange(
		&self,
		config: &ClientConfig,
		metadata: &ProviderMetadata,
		code: &str,
	) -> Result<TokenResponse> {
		if config.require_https {
			security::enforce_https(&metadata.token_endpoint)?;
		}

		let auth_method = ClientAuthMethod::negotiate(metadata);
		let mut form = vec![
			("grant_type", "authorization_code"),
			("code", code),
			("redirect_uri", config.redirect_url.as_str()),
		];
		let mut request =
			self.client.post(metadata.token_endpoint.clone()).header(ACCEPT, "application/json");

		match auth_method {
			ClientAuthMethod::ClientSecretBasic => {
				request = request.basic_auth(
					form_encode(&config.client_id),
					Some(form_encode(&config.client_secret)),
				);
			},
			ClientAuthMethod::ClientSecretPost => {
				form.push(("client_id", config.client_id.as_str()));
				form.push(("client_secret", config.client_secret.as_str()));
			},
		}

		let start = Instant::now();
		let response = request.form(&form).send().await?;
		let elapsed = start.elapsed();
		let status = response.status();

		if !status.is_success() {
			let body = response.text().await.ok();

			tracing::warn!(status = %status, elapsed = ?elapsed, "token endpoint rejected exchange");

			return Err(Error::HttpStatus { status, url: metadata.token_endpoint.clone(), body });
		}

		let raw = serde_json::from_slice::<RawTokenResponse>(&response.bytes().await?)?;
		let tokens = self.finish(raw)?;

		tracing::debug!(
			auth_method = ?auth_method,
			elapsed = ?elapsed,
			subject = ?tokens.claims.subject(),
			"code exchange complete"
		);

		Ok(tokens)
	}

	fn finish(&self, raw: RawTokenResponse) -> Result<TokenResponse> {
		let RawTokenResponse { access_token, token_type, refresh_token, expires_in, scope, mut extra } =
			raw;

		if !token_type.eq_ignore_ascii_case("bearer") {
			return Err(Error::UnexpectedTokenType(token_type));
		}

		let id_token = match extra.remove("id_token") {
			Some(Value::String(id_token)) if !id_token.is_empty() => id_token,
			_ => return Err(Error::MissingIdToken),
		};
		let claims = IdTokenClaims::decode(&id_token)?;
		let expires_at = expires_in
			.as_ref()
			.and_then(parse_expires_in)
			.filter(|seconds| *seconds > 0)
			.and_then(TimeDelta::try_seconds)
			.and_then(|lifetime| self.clock.now().checked_add_signed(lifetime));

		Ok(TokenResponse {
			access_token,
			token_type,
			refresh_token,
			expires_at,
			scope,
			id_token,
			claims,
			extra,
		})
	}
}

fn parse_expires_in(value: &Value) -> Option<i64> {
	match value {
		Value::Number(number) => number.as_i64(),
		Value::String(raw) => raw.trim().parse().ok(),
		_ => None,
	}
}

fn form_encode(value: &str) -> String {
	form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
