//! Mock provider wiring shared by the integration tests.

// crates.io
use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use oidc_session::{ClientConfig, Result};
use serde_json::{Value, json};
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{body_string_contains, method, path},
};

pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";
pub const CLIENT_ID: &str = "client-a";

pub fn discovery_document(server: &MockServer) -> Value {
	let uri = server.uri();

	json!({
		"issuer": uri,
		"authorization_endpoint": format!("{uri}/authorize"),
		"token_endpoint": format!("{uri}/token"),
		"userinfo_endpoint": format!("{uri}/userinfo"),
		"jwks_uri": format!("{uri}/jwks"),
		"response_types_supported": ["code"],
		"token_endpoint_auth_methods_supported": ["client_secret_post"]
	})
}

pub async fn mount_discovery(server: &MockServer, cache_control: &str) {
	Mock::given(method("GET"))
		.and(path(DISCOVERY_PATH))
		.respond_with(
			ResponseTemplate::new(200)
				.set_body_json(discovery_document(server))
				.insert_header("cache-control", cache_control),
		)
		.mount(server)
		.await;
}

pub fn client_config(server: &MockServer) -> Result<ClientConfig> {
	Ok(ClientConfig::new(
		"mock",
		CLIENT_ID,
		"s3cret",
		"http://app.test/callbacks/mock",
		format!("{}{DISCOVERY_PATH}", server.uri()),
	)?
	.with_require_https(false))
}

/// Unsigned compact token carrying `claims`.
pub fn id_token(claims: &Value) -> String {
	let encode = |value: &Value| BASE64_URL_SAFE_NO_PAD.encode(value.to_string());

	format!("{}.{}.c2ln", encode(&json!({ "alg": "RS256", "typ": "JWT" })), encode(claims))
}

pub fn claims_for(server: &MockServer, sub: &str, email: &str, nonce: &str) -> Value {
	let now = chrono::Utc::now().timestamp();

	json!({
		"iss": server.uri(),
		"sub": sub,
		"aud": CLIENT_ID,
		"email": email,
		"email_verified": true,
		"iat": now,
		"exp": now + 600,
		"nonce": nonce
	})
}

/// Answer the exchange of `code` with an ID token carrying `claims`.
pub async fn mount_token(server: &MockServer, code: &str, claims: &Value) {
	Mock::given(method("POST"))
		.and(path("/token"))
		.and(body_string_contains(format!("code={code}")))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"access_token": "access-token",
			"token_type": "Bearer",
			"expires_in": 3600,
			"id_token": id_token(claims)
		})))
		.mount(server)
		.await;
}
