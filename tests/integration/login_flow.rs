//! End-to-end authorization-code logins against a mock provider.

// std
use std::sync::Arc;
// crates.io
use http::{
	HeaderMap, HeaderValue, StatusCode,
	header::{COOKIE, LOCATION, SET_COOKIE},
};
use oidc_session::{
	CallbackParams, ClaimError, Error, ErrorKind, LoginFlow, LoginOutcome, MemoryStore, NonceMode,
	Resolution, Result, SessionConfig, SessionState, flow,
};
use serde_json::Value;
use wiremock::MockServer;
// self
use crate::support;

struct Provider {
	server: MockServer,
	store: Arc<MemoryStore>,
	flow: LoginFlow,
}
impl Provider {
	async fn start() -> Result<Self> {
		Self::start_with(NonceMode::ReuseState).await
	}

	async fn start_with(nonce_mode: NonceMode) -> Result<Self> {
		let _ = tracing_subscriber::fmt::try_init();

		let server = MockServer::start().await;

		support::mount_discovery(&server, "public, max-age=300").await;

		let store = Arc::new(MemoryStore::new());
		let flow = LoginFlow::builder(
			support::client_config(&server)?.with_nonce_mode(nonce_mode),
			SessionConfig::new("http://app.test")?,
			store.clone(),
		)
		.build()?;

		Ok(Self { server, store, flow })
	}

	/// Answer `code` with an ID token carrying `claims` and return the matching callback.
	async fn callback(&self, state: &str, code: &str, claims: &Value) -> CallbackParams {
		support::mount_token(&self.server, code, claims).await;

		CallbackParams { state: Some(state.into()), code: Some(code.into()), error: None }
	}

	/// Begin a login and prepare the provider to answer `code` for `sub`/`email`.
	async fn authorize(&self, code: &str, sub: &str, email: &str) -> Result<CallbackParams> {
		let redirect = self.flow.begin().await?;
		let claims = support::claims_for(&self.server, sub, email, &redirect.nonce);

		support::mount_token(&self.server, code, &claims).await;

		Ok(CallbackParams { state: Some(redirect.state), code: Some(code.into()), error: None })
	}

	async fn login(
		&self,
		code: &str,
		sub: &str,
		email: &str,
		current: &SessionState,
	) -> Result<LoginOutcome> {
		let params = self.authorize(code, sub, email).await?;

		self.flow.complete(&params, current).await
	}
}

fn cookie_headers(outcome: &LoginOutcome) -> HeaderMap {
	let mut headers = HeaderMap::new();
	let value = format!("{}={}", outcome.cookie.name, outcome.cookie.value);

	headers.insert(COOKIE, HeaderValue::from_str(&value).expect("cookie header"));

	headers
}

#[tokio::test]
async fn successful_login_issues_session_and_redirects_home() -> Result<()> {
	let provider = Provider::start().await?;
	let redirect = provider.flow.begin().await?;
	let query = redirect.url.query_pairs().collect::<Vec<_>>();

	assert_eq!(redirect.url.path(), "/authorize");
	assert!(query.iter().any(|(k, v)| k == "state" && *v == redirect.state));
	assert!(query.iter().any(|(k, v)| k == "response_type" && v == "code"));
	assert_eq!(redirect.nonce, redirect.state);

	let outcome =
		provider.login("code-1", "alice-sub", "alice@example.com", &SessionState::anonymous()).await?;

	assert_eq!(outcome.user.email, "alice@example.com");
	assert_eq!(outcome.resolution, Resolution::UpsertedByEmail);
	assert_eq!(outcome.redirect_to.as_str(), "http://app.test/");

	let response = outcome.to_response()?;

	assert_eq!(response.status(), StatusCode::FOUND);
	assert_eq!(response.headers()[LOCATION], "http://app.test/");
	assert!(response.headers()[SET_COOKIE].to_str().expect("ascii").contains("HttpOnly"));

	let state = provider.flow.resolve_session(&cookie_headers(&outcome)).await?;

	assert_eq!(state.user_id(), Some(outcome.user.id));
	assert_eq!(provider.store.user_count().await, 1);
	assert_eq!(provider.store.identity_count().await, 1);

	Ok(())
}

#[tokio::test]
async fn repeat_login_reuses_existing_user() -> Result<()> {
	let provider = Provider::start().await?;
	let anonymous = SessionState::anonymous();
	let first = provider.login("code-1", "alice-sub", "alice@example.com", &anonymous).await?;
	let second = provider.login("code-2", "alice-sub", "alice@example.com", &anonymous).await?;

	assert_eq!(first.user.id, second.user.id);
	assert_eq!(second.resolution, Resolution::ReusedIdentity);
	assert_ne!(first.session.id, second.session.id);
	assert_eq!(provider.store.user_count().await, 1);

	Ok(())
}

#[tokio::test]
async fn tampered_state_is_rejected_without_side_effects() -> Result<()> {
	let provider = Provider::start().await?;
	let mut params = provider.authorize("code-1", "alice-sub", "alice@example.com").await?;

	params.state = Some("tampered".into());

	let err = provider
		.flow
		.complete(&params, &SessionState::anonymous())
		.await
		.expect_err("unknown state");

	assert!(matches!(err, Error::UnknownState));
	assert_eq!(flow::error_response(&err).status(), StatusCode::BAD_REQUEST);
	assert_eq!(provider.store.user_count().await, 0);
	assert_eq!(provider.store.session_count().await, 0);

	Ok(())
}

#[tokio::test]
async fn replayed_callback_is_rejected() -> Result<()> {
	let provider = Provider::start().await?;
	let params = provider.authorize("code-1", "alice-sub", "alice@example.com").await?;
	let anonymous = SessionState::anonymous();

	provider.flow.complete(&params, &anonymous).await?;

	let err = provider.flow.complete(&params, &anonymous).await.expect_err("replayed callback");

	assert!(matches!(err, Error::NonceAlreadyUsed));
	assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
	assert_eq!(provider.store.session_count().await, 1);

	Ok(())
}

#[tokio::test]
async fn missing_code_is_a_bad_request() -> Result<()> {
	let provider = Provider::start().await?;
	let mut params = provider.authorize("code-1", "alice-sub", "alice@example.com").await?;

	params.code = None;
	params.error = Some("access_denied".into());

	let err = provider
		.flow
		.complete(&params, &SessionState::anonymous())
		.await
		.expect_err("no code");

	assert!(matches!(err, Error::MissingCode));
	assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
	assert_eq!(provider.store.session_count().await, 0);

	Ok(())
}

#[tokio::test]
async fn signed_in_user_links_new_identity_but_not_a_foreign_one() -> Result<()> {
	let provider = Provider::start().await?;
	let anonymous = SessionState::anonymous();
	let alice = provider.login("code-a", "alice-sub", "alice@example.com", &anonymous).await?;
	let bob = provider.login("code-b", "bob-sub", "bob@example.com", &anonymous).await?;
	let bob_state = provider.flow.resolve_session(&cookie_headers(&bob)).await?;
	let linked = provider.login("code-c", "bob-alt-sub", "bob@other.example", &bob_state).await?;

	assert_eq!(linked.user.id, bob.user.id);
	assert_eq!(linked.resolution, Resolution::LinkedToCaller);
	assert_eq!(provider.flow.user_data(&bob_state).await?.identities.len(), 2);

	let err = provider
		.login("code-d", "alice-sub", "alice@example.com", &bob_state)
		.await
		.expect_err("identity belongs to alice");

	assert!(matches!(err, Error::AccountAlreadyLinked));
	assert_eq!(err.status_code(), StatusCode::CONFLICT);
	assert_eq!(provider.flow.user_data(&bob_state).await?.identities.len(), 2);

	let alice_state = provider.flow.resolve_session(&cookie_headers(&alice)).await?;

	assert_eq!(provider.flow.user_data(&alice_state).await?.identities.len(), 1);

	Ok(())
}

#[tokio::test]
async fn logout_and_account_deletion_clear_state() -> Result<()> {
	let provider = Provider::start().await?;
	let anonymous = SessionState::anonymous();
	let first = provider.login("code-1", "alice-sub", "alice@example.com", &anonymous).await?;
	let state = provider.flow.resolve_session(&cookie_headers(&first)).await?;
	let cleared = provider.flow.logout(&state).await?.expect("clearing cookie");

	assert!(cleared.is_clearing());
	assert!(provider.flow.resolve_session(&cookie_headers(&first)).await?.user_id().is_none());
	assert!(matches!(provider.flow.user_data(&anonymous).await, Err(Error::Unauthorized)));

	let second = provider.login("code-2", "alice-sub", "alice@example.com", &anonymous).await?;
	let state = provider.flow.resolve_session(&cookie_headers(&second)).await?;
	let cleared = provider.flow.delete_account(&state).await?;

	assert!(cleared.is_clearing());
	assert_eq!(provider.store.user_count().await, 0);
	assert_eq!(provider.store.identity_count().await, 0);
	assert_eq!(provider.store.session_count().await, 0);

	Ok(())
}

#[tokio::test]
async fn nonce_must_echo_the_state() -> Result<()> {
	let provider = Provider::start().await?;
	let redirect = provider.flow.begin().await?;
	let claims = support::claims_for(&provider.server, "alice-sub", "a@example.com", "other");
	let params = provider.callback(&redirect.state, "code-1", &claims).await;
	let err = provider
		.flow
		.complete(&params, &SessionState::anonymous())
		.await
		.expect_err("nonce differs from state");

	assert!(matches!(err, Error::NonceMismatch));
	assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
	assert_eq!(provider.store.session_count().await, 0);

	Ok(())
}

#[tokio::test]
async fn id_token_without_nonce_is_rejected() -> Result<()> {
	let provider = Provider::start().await?;
	let redirect = provider.flow.begin().await?;
	let mut claims = support::claims_for(&provider.server, "alice-sub", "a@example.com", "");

	claims.as_object_mut().expect("claims object").remove("nonce");

	let params = provider.callback(&redirect.state, "code-1", &claims).await;
	let err = provider
		.flow
		.complete(&params, &SessionState::anonymous())
		.await
		.expect_err("nonce claim absent");

	assert!(matches!(err, Error::MissingNonce));
	assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

	Ok(())
}

#[tokio::test]
async fn claim_mismatches_are_bad_requests() -> Result<()> {
	let provider = Provider::start().await?;
	let cases = [
		("code-1", "iss", serde_json::json!("https://evil.example.com")),
		("code-2", "aud", serde_json::json!("someone-else")),
		("code-3", "exp", serde_json::json!(1_000_000_000)),
	];

	for (code, claim, value) in cases {
		let redirect = provider.flow.begin().await?;
		let mut claims =
			support::claims_for(&provider.server, "alice-sub", "a@example.com", &redirect.nonce);

		claims[claim] = value;

		let params = provider.callback(&redirect.state, code, &claims).await;
		let err = provider
			.flow
			.complete(&params, &SessionState::anonymous())
			.await
			.expect_err("claim mismatch");

		assert!(matches!(err, Error::Claim(_)), "{claim}: {err}");
		assert_eq!(err.kind(), ErrorKind::ClaimValidation);
		assert_eq!(flow::error_response(&err).status(), StatusCode::BAD_REQUEST);

		if claim == "exp" {
			assert!(matches!(err, Error::Claim(ClaimError::Expired { .. })));
		}
	}

	assert_eq!(provider.store.user_count().await, 0);
	assert_eq!(provider.store.session_count().await, 0);

	Ok(())
}

#[tokio::test]
async fn independent_nonce_completes_one_login_per_state() -> Result<()> {
	let provider = Provider::start_with(NonceMode::Independent).await?;
	let anonymous = SessionState::anonymous();
	let redirect = provider.flow.begin().await?;

	assert_ne!(redirect.nonce, redirect.state);
	assert!(
		redirect.url.query_pairs().any(|(k, v)| k == "nonce" && *v == redirect.nonce),
		"authorization url carries the bound nonce"
	);

	let claims = support::claims_for(&provider.server, "x-sub", "x@example.com", &redirect.nonce);
	let params = provider.callback(&redirect.state, "code-1", &claims).await;
	let outcome = provider.flow.complete(&params, &anonymous).await?;

	assert_eq!(outcome.user.email, "x@example.com");

	let err = provider.flow.complete(&params, &anonymous).await.expect_err("state reused");

	assert!(matches!(err, Error::NonceAlreadyUsed));
	assert_eq!(provider.store.session_count().await, 1);

	Ok(())
}

#[tokio::test]
async fn independent_nonce_is_bound_to_its_state() -> Result<()> {
	let provider = Provider::start_with(NonceMode::Independent).await?;
	let anonymous = SessionState::anonymous();
	let a = provider.flow.begin().await?;
	let b = provider.flow.begin().await?;
	let crossed = support::claims_for(&provider.server, "x-sub", "x@example.com", &b.nonce);
	let params = provider.callback(&a.state, "code-1", &crossed).await;
	let err = provider.flow.complete(&params, &anonymous).await.expect_err("foreign nonce");

	assert!(matches!(err, Error::NonceMismatch));

	let swapped = support::claims_for(&provider.server, "z-sub", "z@example.com", &b.state);
	let params = provider.callback(&b.nonce, "code-2", &swapped).await;
	let err = provider.flow.complete(&params, &anonymous).await.expect_err("nonce as state");

	assert!(matches!(err, Error::UnknownState));

	let own = support::claims_for(&provider.server, "y-sub", "y@example.com", &b.nonce);
	let params = provider.callback(&b.state, "code-3", &own).await;

	provider.flow.complete(&params, &anonymous).await?;

	assert_eq!(provider.store.session_count().await, 1);

	Ok(())
}
