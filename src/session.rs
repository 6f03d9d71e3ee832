//! Local sessions: issue, resolve, expire, and end.

pub mod cookie;

pub use cookie::{SameSite, SessionCookie, session_id_from_headers};

// crates.io
use http::HeaderMap;
// self
use crate::{
	_prelude::*,
	clock::Clock,
	config::SessionConfig,
	security,
	store::{PersistenceGateway, Session, UserId},
};

/// Authentication state attached to an incoming request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
	/// A live session was found.
	Authenticated {
		/// Session id from the cookie.
		session_id: String,
		/// Session owner.
		user_id: UserId,
	},
	/// No usable session; `clear_cookie` is set when an expired session was just removed.
	Anonymous {
		/// Cookie the response should send to drop the stale session id.
		clear_cookie: Option<SessionCookie>,
	},
}
impl SessionState {
	/// Anonymous state with nothing to clear.
	pub fn anonymous() -> Self {
		Self::Anonymous { clear_cookie: None }
	}

	/// Authenticated user, if any.
	pub fn user_id(&self) -> Option<UserId> {
		match self {
			Self::Authenticated { user_id, .. } => Some(*user_id),
			Self::Anonymous { .. } => None,
		}
	}

	/// Session id, if authenticated.
	pub fn session_id(&self) -> Option<&str> {
		match self {
			Self::Authenticated { session_id, .. } => Some(session_id),
			Self::Anonymous { .. } => None,
		}
	}

	/// Guard for handlers that require a signed-in user.
	pub fn require_user(&self) -> Result<UserId> {
		self.user_id().ok_or(Error::Unauthorized)
	}
}

/// Creates and resolves cookie-bound sessions.
#[derive(Clone, Debug)]
pub struct SessionManager {
	store: Arc<dyn PersistenceGateway>,
	clock: Arc<dyn Clock>,
	config: Arc<SessionConfig>,
	lifetime: TimeDelta,
}
impl SessionManager {
	/// Create a manager after validating `config`.
	pub fn new(
		store: Arc<dyn PersistenceGateway>,
		clock: Arc<dyn Clock>,
		config: SessionConfig,
	) -> Result<Self> {
		config.validate()?;

		let lifetime = TimeDelta::from_std(config.lifetime).map_err(|err| Error::Validation {
			field: "lifetime",
			reason: format!("Out of range: {err}."),
		})?;

		Ok(Self { store, clock, config: Arc::new(config), lifetime })
	}

	/// Session settings.
	pub fn config(&self) -> &SessionConfig {
		&self.config
	}

	/// Resolve the session referenced by a cookie value.
	///
	/// Unknown ids are anonymous. Expired sessions are deleted and answered with a clearing
	/// cookie; a failed delete is reported as an error.
	#[tracing::instrument(skip_all)]
	pub async fn resolve(&self, session_id: Option<&str>) -> Result<SessionState> {
		let Some(session_id) = session_id.filter(|id| !id.is_empty()) else {
			return Ok(SessionState::anonymous());
		};
		let Some(session) = self.store.get_session(session_id).await? else {
			tracing::debug!(session = %security::fingerprint(session_id), "unknown session id");

			return Ok(SessionState::anonymous());
		};

		if self.is_expired(&session) {
			self.store.delete_session(session_id).await?;

			tracing::info!(
				session = %security::fingerprint(session_id),
				user = %session.user_id,
				"expired session removed"
			);

			return Ok(SessionState::Anonymous { clear_cookie: Some(self.clearing_cookie()) });
		}

		Ok(SessionState::Authenticated { session_id: session.id, user_id: session.user_id })
	}

	/// Resolve the session referenced by the request's `Cookie` headers.
	pub async fn resolve_headers(&self, headers: &HeaderMap) -> Result<SessionState> {
		let session_id = session_id_from_headers(headers, &self.config.cookie_name);

		self.resolve(session_id.as_deref()).await
	}

	/// Issue a new session for `user_id` and the cookie carrying it.
	#[tracing::instrument(skip(self))]
	pub async fn start(&self, user_id: UserId) -> Result<(Session, SessionCookie)> {
		let now = self.clock.now();
		let session = Session { id: security::random_token(), user_id, created_at: now };

		self.store.insert_session(&session).await?;

		let cookie = SessionCookie {
			name: self.config.cookie_name.clone(),
			value: session.id.clone(),
			path: self.config.cookie_path.clone(),
			expires: now.checked_add_signed(self.lifetime),
			max_age: Some(self.lifetime.num_seconds()),
			http_only: true,
			secure: self.config.is_secure(),
			same_site: SameSite::Strict,
		};

		tracing::info!(session = %security::fingerprint(&session.id), "session started");

		Ok((session, cookie))
	}

	/// Delete the session, if any, and return the cookie that clears it.
	#[tracing::instrument(skip_all)]
	pub async fn end(&self, session_id: Option<&str>) -> Result<Option<SessionCookie>> {
		let Some(session_id) = session_id.filter(|id| !id.is_empty()) else {
			return Ok(None);
		};

		self.store.delete_session(session_id).await?;

		tracing::info!(session = %security::fingerprint(session_id), "session ended");

		Ok(Some(self.clearing_cookie()))
	}

	/// Cookie that drops the session id from the browser.
	pub fn clearing_cookie(&self) -> SessionCookie {
		SessionCookie::clearing(
			self.config.cookie_name.clone(),
			self.config.cookie_path.clone(),
			self.config.is_secure(),
		)
	}

	fn is_expired(&self, session: &Session) -> bool {
		self.clock.now().signed_duration_since(session.created_at) > self.lifetime
	}
}
