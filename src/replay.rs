//! One-time state and nonce tokens.
//!
//! Each login attempt persists a state token, optionally carrying an independent nonce bound to
//! it. On callback the state must have been issued, and the nonce echoed in the ID token must be
//! the one bound to that state. The nonce is then consumed exactly once through the store's
//! insert-if-absent, which also limits every state to a single completed login.

// crates.io
use constant_time_eq::constant_time_eq;
// self
use crate::{
	_prelude::*,
	clock::Clock,
	metrics, security,
	store::{PersistenceGateway, StateToken},
};

/// Issues and consumes one-time tokens.
#[derive(Clone, Debug)]
pub struct ReplayGuard {
	store: Arc<dyn PersistenceGateway>,
	clock: Arc<dyn Clock>,
}
impl ReplayGuard {
	/// Create a guard over the given store.
	pub fn new(store: Arc<dyn PersistenceGateway>, clock: Arc<dyn Clock>) -> Self {
		Self { store, clock }
	}

	/// Generate and persist a fresh state token that doubles as its own nonce.
	#[tracing::instrument(skip(self))]
	pub async fn issue(&self) -> Result<String> {
		let issued = self.persist(None).await?;

		Ok(issued.token)
	}

	/// Generate and persist a state token with a separate nonce bound to it.
	#[tracing::instrument(skip(self))]
	pub async fn issue_with_nonce(&self) -> Result<StateToken> {
		self.persist(Some(security::random_token())).await
	}

	/// Accept a callback `state` only when it was previously issued.
	#[tracing::instrument(skip_all, fields(token = %security::fingerprint(token)))]
	pub async fn consume_as_state(&self, token: &str) -> Result<StateToken> {
		if token.is_empty() {
			metrics::record_replay_rejection("state", "missing");

			return Err(Error::MissingState);
		}

		match self.store.get_state_token(token).await? {
			Some(issued) => Ok(issued),
			None => {
				tracing::warn!("state was never issued");
				metrics::record_replay_rejection("state", "unknown");

				Err(Error::UnknownState)
			},
		}
	}

	/// Accept the ID-token `nonce` once, and only when it is the nonce bound to `issued`.
	#[tracing::instrument(skip_all, fields(token = %security::fingerprint(nonce)))]
	pub async fn consume_as_nonce(&self, issued: &StateToken, nonce: &str) -> Result<()> {
		if nonce.is_empty() {
			metrics::record_replay_rejection("nonce", "missing");

			return Err(Error::MissingNonce);
		}
		if !constant_time_eq(nonce.as_bytes(), issued.expected_nonce().as_bytes()) {
			tracing::warn!(
				state = %security::fingerprint(&issued.token),
				"nonce is not bound to the callback state"
			);
			metrics::record_replay_rejection("nonce", "mismatch");

			return Err(Error::NonceMismatch);
		}
		if !self.store.insert_nonce(nonce, self.clock.now()).await? {
			tracing::warn!("nonce replay detected");
			metrics::record_replay_rejection("nonce", "reused");

			return Err(Error::NonceAlreadyUsed);
		}

		Ok(())
	}

	async fn persist(&self, nonce: Option<String>) -> Result<StateToken> {
		let issued =
			StateToken { token: security::random_token(), nonce, created_at: self.clock.now() };

		self.store.insert_state_token(&issued).await?;

		tracing::debug!(token = %security::fingerprint(&issued.token), "issued one-time token");

		Ok(issued)
	}
}
