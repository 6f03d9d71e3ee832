//! In-process [`PersistenceGateway`] used by tests and single-node deployments.

// std
use std::{
	collections::HashMap,
	sync::atomic::{AtomicBool, Ordering},
};
// crates.io
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;
// self
use crate::{
	_prelude::*,
	clock::{Clock, SystemClock},
	store::{Identity, PersistenceGateway, Session, StateToken, StoreError, StoreResult, User, UserId},
};

#[derive(Debug, Default)]
struct Tables {
	state_tokens: HashMap<String, StateToken>,
	used_nonces: HashMap<String, DateTime<Utc>>,
	users: HashMap<UserId, User>,
	users_by_email: HashMap<String, UserId>,
	identities: Vec<Identity>,
	sessions: HashMap<String, Session>,
}

/// Thread-safe in-memory store.
#[derive(Debug)]
pub struct MemoryStore {
	tables: RwLock<Tables>,
	unavailable: AtomicBool,
	clock: Arc<dyn Clock>,
}
impl MemoryStore {
	/// Create an empty store stamping records with the system clock.
	pub fn new() -> Self {
		Self::with_clock(Arc::new(SystemClock))
	}

	/// Create an empty store stamping records with `clock`.
	pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
		Self { tables: Default::default(), unavailable: AtomicBool::new(false), clock }
	}

	/// Make every subsequent call fail with [`StoreError::Backend`] while `true`.
	pub fn set_unavailable(&self, unavailable: bool) {
		self.unavailable.store(unavailable, Ordering::SeqCst);
	}

	/// Rewrite a session's issue time; returns `false` when the session does not exist.
	pub async fn set_session_created_at(&self, id: &str, created_at: DateTime<Utc>) -> bool {
		let mut tables = self.tables.write().await;

		match tables.sessions.get_mut(id) {
			Some(session) => {
				session.created_at = created_at;

				true
			},
			None => false,
		}
	}

	/// Number of stored users.
	pub async fn user_count(&self) -> usize {
		self.tables.read().await.users.len()
	}

	/// Number of stored sessions.
	pub async fn session_count(&self) -> usize {
		self.tables.read().await.sessions.len()
	}

	/// Number of stored identities.
	pub async fn identity_count(&self) -> usize {
		self.tables.read().await.identities.len()
	}

	fn check_available(&self) -> StoreResult<()> {
		if self.unavailable.load(Ordering::SeqCst) {
			Err(StoreError::Backend("memory store marked unavailable".into()))
		} else {
			Ok(())
		}
	}
}
impl Default for MemoryStore {
	fn default() -> Self {
		Self::new()
	}
}
#[async_trait]
impl PersistenceGateway for MemoryStore {
	async fn insert_state_token(&self, token: &StateToken) -> StoreResult<()> {
		self.check_available()?;

		self.tables.write().await.state_tokens.insert(token.token.clone(), token.clone());

		Ok(())
	}

	async fn get_state_token(&self, token: &str) -> StoreResult<Option<StateToken>> {
		self.check_available()?;

		Ok(self.tables.read().await.state_tokens.get(token).cloned())
	}

	async fn insert_nonce(&self, nonce: &str, used_at: DateTime<Utc>) -> StoreResult<bool> {
		self.check_available()?;

		let mut tables = self.tables.write().await;

		if tables.used_nonces.contains_key(nonce) {
			return Ok(false);
		}

		tables.used_nonces.insert(nonce.to_owned(), used_at);

		Ok(true)
	}

	async fn upsert_user_by_email(&self, email: &str) -> StoreResult<User> {
		self.check_available()?;

		let mut tables = self.tables.write().await;

		if let Some(user) = tables.users_by_email.get(email).and_then(|id| tables.users.get(id)) {
			return Ok(user.clone());
		}

		let user = User { id: UserId::new(), email: email.to_owned() };

		tables.users_by_email.insert(user.email.clone(), user.id);
		tables.users.insert(user.id, user.clone());

		Ok(user)
	}

	async fn get_user_by_identity(
		&self,
		provider_id: &str,
		external_id: &str,
	) -> StoreResult<Option<User>> {
		self.check_available()?;

		let tables = self.tables.read().await;

		Ok(tables
			.identities
			.iter()
			.find(|identity| {
				identity.provider_id == provider_id && identity.external_id == external_id
			})
			.and_then(|identity| tables.users.get(&identity.user_id))
			.cloned())
	}

	async fn get_user(&self, id: UserId) -> StoreResult<User> {
		self.check_available()?;

		self.tables
			.read()
			.await
			.users
			.get(&id)
			.cloned()
			.ok_or_else(|| StoreError::NotFound(format!("user {id}")))
	}

	async fn upsert_identity(
		&self,
		user_id: UserId,
		provider_id: &str,
		external_id: &str,
		id_token_claims: &Value,
	) -> StoreResult<Identity> {
		self.check_available()?;

		let mut tables = self.tables.write().await;

		if !tables.users.contains_key(&user_id) {
			return Err(StoreError::NotFound(format!("user {user_id}")));
		}

		let now = self.clock.now();

		if let Some(identity) = tables.identities.iter_mut().find(|identity| {
			identity.provider_id == provider_id && identity.external_id == external_id
		}) {
			identity.most_recent_id_token = id_token_claims.clone();
			identity.updated_at = now;

			return Ok(identity.clone());
		}

		let identity = Identity {
			id: Uuid::new_v4(),
			user_id,
			provider_id: provider_id.to_owned(),
			external_id: external_id.to_owned(),
			most_recent_id_token: id_token_claims.clone(),
			updated_at: now,
		};

		tables.identities.push(identity.clone());

		Ok(identity)
	}

	async fn list_identities(&self, user_id: UserId) -> StoreResult<Vec<Identity>> {
		self.check_available()?;

		Ok(self
			.tables
			.read()
			.await
			.identities
			.iter()
			.filter(|identity| identity.user_id == user_id)
			.cloned()
			.collect())
	}

	async fn insert_session(&self, session: &Session) -> StoreResult<()> {
		self.check_available()?;
		self.tables.write().await.sessions.insert(session.id.clone(), session.clone());

		Ok(())
	}

	async fn get_session(&self, id: &str) -> StoreResult<Option<Session>> {
		self.check_available()?;

		Ok(self.tables.read().await.sessions.get(id).cloned())
	}

	async fn delete_session(&self, id: &str) -> StoreResult<()> {
		self.check_available()?;
		self.tables.write().await.sessions.remove(id);

		Ok(())
	}

	async fn delete_user(&self, id: UserId) -> StoreResult<()> {
		self.check_available()?;

		let mut tables = self.tables.write().await;
		let Some(user) = tables.users.remove(&id) else {
			return Err(StoreError::NotFound(format!("user {id}")));
		};

		tables.users_by_email.remove(&user.email);
		tables.identities.retain(|identity| identity.user_id != id);
		tables.sessions.retain(|_, session| session.user_id != id);

		Ok(())
	}
}
