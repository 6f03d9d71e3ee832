//! Persistence gateway contract for one-time tokens, users, identities, and sessions.

pub mod memory;

pub use memory::MemoryStore;

// std
use std::{
	fmt::{Debug, Display, Formatter, Result as FmtResult},
	str::FromStr,
};
// crates.io
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
// self
use crate::_prelude::*;

/// Result type returned by persistence backends.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failures raised by a persistence backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
	/// The addressed record does not exist.
	#[error("Record not found: {0}.")]
	NotFound(String),
	/// The backend could not serve the request.
	#[error("Storage backend failure: {0}")]
	Backend(String),
}

/// Durable identifier of a local user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);
impl UserId {
	/// Allocate a fresh random id.
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}

	/// Underlying UUID.
	pub fn as_uuid(&self) -> &Uuid {
		&self.0
	}
}
impl Default for UserId {
	fn default() -> Self {
		Self::new()
	}
}
impl Display for UserId {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		Display::fmt(&self.0, f)
	}
}
impl FromStr for UserId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		Uuid::parse_str(s).map(Self)
	}
}
impl From<Uuid> for UserId {
	fn from(value: Uuid) -> Self {
		Self(value)
	}
}

/// Local account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
	/// Durable id.
	pub id: UserId,
	/// Unique email address.
	pub email: String,
}

/// External account at a provider, linked to exactly one local user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Identity {
	/// Row id.
	pub id: Uuid,
	/// Owning local user; never changes once created.
	pub user_id: UserId,
	/// Provider the external account lives at.
	pub provider_id: String,
	/// Provider-scoped subject identifier.
	pub external_id: String,
	/// Claims of the most recent ID token seen for this identity.
	pub most_recent_id_token: Value,
	/// Last time the stored claims were replaced.
	pub updated_at: DateTime<Utc>,
}

/// Server-side login session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
	/// Opaque bearer id carried by the session cookie.
	pub id: String,
	/// Authenticated user.
	pub user_id: UserId,
	/// Issue time; the session expires a fixed lifetime after it.
	pub created_at: DateTime<Utc>,
}
impl Debug for Session {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("Session")
			.field("id", &crate::security::fingerprint(&self.id))
			.field("user_id", &self.user_id)
			.field("created_at", &self.created_at)
			.finish()
	}
}

/// Issued one-time state token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateToken {
	/// Token value.
	pub token: String,
	/// Independent nonce bound to this state; `None` when the state doubles as the nonce.
	pub nonce: Option<String>,
	/// Issue time.
	pub created_at: DateTime<Utc>,
}
impl StateToken {
	/// Nonce the ID token must echo for this state.
	pub fn expected_nonce(&self) -> &str {
		self.nonce.as_deref().unwrap_or(&self.token)
	}
}
impl Debug for StateToken {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("StateToken")
			.field("token", &crate::security::fingerprint(&self.token))
			.field("nonce", &self.nonce.as_deref().map(crate::security::fingerprint))
			.field("created_at", &self.created_at)
			.finish()
	}
}

/// Storage operations the login engine depends on.
///
/// Implementations must make [`insert_nonce`](Self::insert_nonce) an atomic insert-if-absent and
/// keep `(provider_id, external_id)` unique across identities.
#[async_trait]
pub trait PersistenceGateway: Send + Sync + Debug {
	/// Record a freshly issued state token together with its bound nonce.
	async fn insert_state_token(&self, token: &StateToken) -> StoreResult<()>;

	/// Look up an issued state token by its state value; bound nonces are not keys.
	async fn get_state_token(&self, token: &str) -> StoreResult<Option<StateToken>>;

	/// Mark a nonce as used; `false` when it was already present.
	async fn insert_nonce(&self, nonce: &str, used_at: DateTime<Utc>) -> StoreResult<bool>;

	/// Return the user owning `email`, creating it when absent.
	async fn upsert_user_by_email(&self, email: &str) -> StoreResult<User>;

	/// Resolve the user linked to an external identity.
	async fn get_user_by_identity(
		&self,
		provider_id: &str,
		external_id: &str,
	) -> StoreResult<Option<User>>;

	/// Fetch a user by id; [`StoreError::NotFound`] when absent.
	async fn get_user(&self, id: UserId) -> StoreResult<User>;

	/// Create or refresh an identity; an existing row keeps its user and only replaces its claims.
	async fn upsert_identity(
		&self,
		user_id: UserId,
		provider_id: &str,
		external_id: &str,
		id_token_claims: &Value,
	) -> StoreResult<Identity>;

	/// Identities linked to a user, oldest first.
	async fn list_identities(&self, user_id: UserId) -> StoreResult<Vec<Identity>>;

	/// Persist a new session.
	async fn insert_session(&self, session: &Session) -> StoreResult<()>;

	/// Look up a session by id.
	async fn get_session(&self, id: &str) -> StoreResult<Option<Session>>;

	/// Remove a session; absent ids are not an error.
	async fn delete_session(&self, id: &str) -> StoreResult<()>;

	/// Remove a user together with its identities and sessions.
	async fn delete_user(&self, id: UserId) -> StoreResult<()>;
}
