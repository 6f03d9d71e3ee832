//! Authorization redirect construction.

// crates.io
use url::Url;
// self
use crate::{
	_prelude::*,
	cache::manager::DiscoveryCache,
	config::{ClientConfig, NonceMode},
	replay::ReplayGuard,
	security,
};

/// Where to send the browser, plus the one-time values bound into the URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationRedirect {
	/// Provider authorization URL.
	pub url: Url,
	/// Issued state token.
	pub state: String,
	/// Nonce the ID token must echo; equals `state` in [`NonceMode::ReuseState`].
	pub nonce: String,
}

/// Builds authorization redirects from discovered provider metadata.
#[derive(Clone, Debug)]
pub struct RedirectBuilder {
	discovery: DiscoveryCache,
	replay: ReplayGuard,
}
impl RedirectBuilder {
	/// Create a builder over a shared discovery cache and replay guard.
	pub fn new(discovery: DiscoveryCache, replay: ReplayGuard) -> Self {
		Self { discovery, replay }
	}

	/// Discover the provider, issue a state token, and build the authorization URL.
	#[tracing::instrument(skip(self, config), fields(provider = %config.provider_id))]
	pub async fn build(&self, config: &ClientConfig) -> Result<AuthorizationRedirect> {
		let metadata = self.discovery.get(&config.discovery_url).await?;

		if config.require_https {
			security::enforce_https(&metadata.authorization_endpoint)?;
		}

		let (state, nonce) = match config.nonce_mode {
			NonceMode::ReuseState => {
				let state = self.replay.issue().await?;

				(state.clone(), state)
			},
			NonceMode::Independent => {
				let issued = self.replay.issue_with_nonce().await?;
				let nonce = issued.expected_nonce().to_owned();

				(issued.token, nonce)
			},
		};
		let url = authorization_url(&metadata.authorization_endpoint, config, &state, &nonce);

		tracing::debug!(
			state = %security::fingerprint(&state),
			endpoint = %metadata.authorization_endpoint,
			"authorization redirect built"
		);

		Ok(AuthorizationRedirect { url, state, nonce })
	}
}

/// Append the authorization-code request parameters to `endpoint`.
pub fn authorization_url(endpoint: &Url, config: &ClientConfig, state: &str, nonce: &str) -> Url {
	let mut url = endpoint.clone();

	url.query_pairs_mut()
		.append_pair("client_id", &config.client_id)
		.append_pair("redirect_uri", config.redirect_url.as_str())
		.append_pair("response_type", "code")
		.append_pair("scope", &config.scopes.join(" "))
		.append_pair("state", state)
		.append_pair("nonce", nonce);

	url
}
