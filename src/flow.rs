//! End-to-end login orchestration: redirect, callback, logout, and account reads.

// crates.io
use http::{
	Response, StatusCode,
	header::{LOCATION, SET_COOKIE},
};
use reqwest::Client;
use url::Url;
// self
use crate::{
	_prelude::*,
	cache::manager::DiscoveryCache,
	clock::{Clock, SystemClock},
	config::{ClientConfig, SessionConfig},
	http::client::{self, ReqwestTransport},
	identity::{IdentityResolver, Resolution, UserData},
	metrics,
	oidc::{
		authorize::{AuthorizationRedirect, RedirectBuilder},
		exchange::TokenExchange,
		validation::IdTokenValidator,
	},
	replay::ReplayGuard,
	session::{SessionCookie, SessionManager, SessionState},
	store::{PersistenceGateway, Session, User},
};

/// Query parameters delivered to the provider callback.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallbackParams {
	/// `state` echoed by the provider.
	pub state: Option<String>,
	/// Authorization `code`.
	pub code: Option<String>,
	/// `error` reported by the provider instead of a code.
	pub error: Option<String>,
}
impl CallbackParams {
	/// Parse an `application/x-www-form-urlencoded` query string.
	pub fn from_query(query: &str) -> Self {
		let mut params = Self::default();

		for (key, value) in url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
			let slot = match &*key {
				"state" => &mut params.state,
				"code" => &mut params.code,
				"error" => &mut params.error,
				_ => continue,
			};

			if slot.is_none() {
				*slot = Some(value.into_owned());
			}
		}

		params
	}

	/// Parse the query of a full callback URL.
	pub fn from_url(url: &Url) -> Self {
		Self::from_query(url.query().unwrap_or_default())
	}
}

/// Result of a completed login.
#[derive(Clone, Debug)]
pub struct LoginOutcome {
	/// Signed-in user.
	pub user: User,
	/// Identity resolution branch.
	pub resolution: Resolution,
	/// Newly issued session.
	pub session: Session,
	/// Cookie carrying the session id.
	pub cookie: SessionCookie,
	/// Where the browser goes next.
	pub redirect_to: Url,
}
impl LoginOutcome {
	/// `302 Found` to the application root with the session cookie set.
	pub fn to_response(&self) -> Result<Response<()>> {
		redirect_response(&self.redirect_to, Some(&self.cookie))
	}
}

/// Builder for [`LoginFlow`].
#[derive(Debug)]
pub struct LoginFlowBuilder {
	client: ClientConfig,
	session: SessionConfig,
	store: Arc<dyn PersistenceGateway>,
	clock: Option<Arc<dyn Clock>>,
	discovery: Option<DiscoveryCache>,
	http_client: Option<Client>,
}
impl LoginFlowBuilder {
	/// Start from the provider registration, session settings, and store.
	pub fn new(
		client: ClientConfig,
		session: SessionConfig,
		store: Arc<dyn PersistenceGateway>,
	) -> Self {
		Self { client, session, store, clock: None, discovery: None, http_client: None }
	}

	/// Read time from `clock` instead of the system clock.
	pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = Some(clock);

		self
	}

	/// Share a discovery cache across several flows.
	pub fn discovery_cache(mut self, discovery: DiscoveryCache) -> Self {
		self.discovery = Some(discovery);

		self
	}

	/// Use the supplied HTTP client for discovery and token requests.
	pub fn http_client(mut self, client: Client) -> Self {
		self.http_client = Some(client);

		self
	}

	/// Validate configuration and assemble the flow.
	pub fn build(self) -> Result<LoginFlow> {
		self.client.validate()?;

		let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
		let http_client = match self.http_client {
			Some(client) => client,
			None => client::default_client()?,
		};
		let discovery = match self.discovery {
			Some(discovery) => discovery,
			None => {
				let transport =
					ReqwestTransport::with_client(http_client.clone(), self.client.require_https)
						.with_max_response_bytes(self.client.max_response_bytes);

				DiscoveryCache::with_parts(Arc::new(transport), clock.clone())
			},
		};
		let replay = ReplayGuard::new(self.store.clone(), clock.clone());
		let sessions = SessionManager::new(self.store.clone(), clock.clone(), self.session)?;

		Ok(LoginFlow {
			config: Arc::new(self.client),
			redirects: RedirectBuilder::new(discovery.clone(), replay.clone()),
			exchange: TokenExchange::with_client(http_client, clock.clone()),
			validator: IdTokenValidator::new(clock),
			identities: IdentityResolver::new(self.store.clone()),
			store: self.store,
			discovery,
			replay,
			sessions,
		})
	}
}

/// Authorization-code login for one provider registration.
#[derive(Clone, Debug)]
pub struct LoginFlow {
	config: Arc<ClientConfig>,
	store: Arc<dyn PersistenceGateway>,
	discovery: DiscoveryCache,
	replay: ReplayGuard,
	redirects: RedirectBuilder,
	exchange: TokenExchange,
	validator: IdTokenValidator,
	identities: IdentityResolver,
	sessions: SessionManager,
}
impl LoginFlow {
	/// Start building a flow.
	pub fn builder(
		client: ClientConfig,
		session: SessionConfig,
		store: Arc<dyn PersistenceGateway>,
	) -> LoginFlowBuilder {
		LoginFlowBuilder::new(client, session, store)
	}

	/// Provider registration.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Discovery cache used by this flow.
	pub fn discovery(&self) -> &DiscoveryCache {
		&self.discovery
	}

	/// Session manager used by this flow.
	pub fn sessions(&self) -> &SessionManager {
		&self.sessions
	}

	/// Resolve the request's session from its `Cookie` headers.
	pub async fn resolve_session(&self, headers: &http::HeaderMap) -> Result<SessionState> {
		self.sessions.resolve_headers(headers).await
	}

	/// Build the provider redirect for a new login attempt.
	pub async fn begin(&self) -> Result<AuthorizationRedirect> {
		self.redirects.build(&self.config).await
	}

	/// Handle the provider callback and sign the user in.
	///
	/// A signed-in `current` session links the provider identity to that user instead of
	/// creating or reusing another account.
	#[tracing::instrument(skip_all, fields(provider = %self.config.provider_id))]
	pub async fn complete(
		&self,
		params: &CallbackParams,
		current: &SessionState,
	) -> Result<LoginOutcome> {
		let result = self.complete_inner(params, current).await;

		match &result {
			Ok(outcome) => {
				metrics::record_login(&self.config.provider_id, "success");

				tracing::info!(
					user = %outcome.user.id,
					resolution = ?outcome.resolution,
					"login complete"
				);
			},
			Err(err) => {
				metrics::record_login(&self.config.provider_id, err.kind().as_str());

				tracing::warn!(error = %err, kind = err.kind().as_str(), "login failed");
			},
		}

		result
	}

	async fn complete_inner(
		&self,
		params: &CallbackParams,
		current: &SessionState,
	) -> Result<LoginOutcome> {
		let state = params.state.as_deref().unwrap_or_default();
		let issued = self.replay.consume_as_state(state).await?;

		if let Some(error) = &params.error {
			tracing::warn!(provider_error = %error, "provider returned an authorization error");
		}

		let code =
			params.code.as_deref().filter(|code| !code.is_empty()).ok_or(Error::MissingCode)?;
		let metadata = self.discovery.get(&self.config.discovery_url).await?;
		let tokens = self.exchange.exchange(&self.config, &metadata, code).await?;

		self.validator.validate(&tokens.claims, &metadata, &self.config.client_id)?;

		self.replay.consume_as_nonce(&issued, tokens.claims.nonce().unwrap_or_default()).await?;

		let resolved = self
			.identities
			.resolve(&self.config.provider_id, &tokens.claims, current.user_id())
			.await?;
		let (session, cookie) = self.sessions.start(resolved.user.id).await?;

		Ok(LoginOutcome {
			user: resolved.user,
			resolution: resolved.resolution,
			session,
			cookie,
			redirect_to: self.sessions.config().home_url()?,
		})
	}

	/// End the current session; returns the clearing cookie when there was one.
	pub async fn logout(&self, current: &SessionState) -> Result<Option<SessionCookie>> {
		self.sessions.end(current.session_id()).await
	}

	/// Profile and linked identities of the signed-in user.
	pub async fn user_data(&self, current: &SessionState) -> Result<UserData> {
		self.identities.user_data(current.require_user()?).await
	}

	/// Delete the signed-in user with all identities and sessions.
	#[tracing::instrument(skip_all)]
	pub async fn delete_account(&self, current: &SessionState) -> Result<SessionCookie> {
		let user_id = current.require_user()?;

		self.store.delete_user(user_id).await?;

		tracing::info!(user = %user_id, "account deleted");

		Ok(self.sessions.clearing_cookie())
	}
}

/// `302 Found` to `location`, optionally setting a cookie.
pub fn redirect_response(location: &Url, cookie: Option<&SessionCookie>) -> Result<Response<()>> {
	let mut builder =
		Response::builder().status(StatusCode::FOUND).header(LOCATION, location.as_str());

	if let Some(cookie) = cookie {
		builder = builder.header(SET_COOKIE, cookie.to_header_value()?);
	}

	Ok(builder.body(())?)
}

/// Bodiless response carrying the status for `err`.
pub fn error_response(err: &Error) -> Response<()> {
	let mut response = Response::new(());

	*response.status_mut() = err.status_code();

	response
}
