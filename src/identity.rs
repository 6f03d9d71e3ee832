//! Mapping a validated external identity to a local user.

// crates.io
use serde::Serialize;
// self
use crate::{
	_prelude::*,
	oidc::claims::{self, IdTokenClaims},
	store::{Identity, PersistenceGateway, User, UserId},
};

/// Branch of the resolution table that produced the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
	/// The identity already belonged to the signed-in caller.
	ReusedCaller,
	/// The identity already belonged to a user and nobody was signed in.
	ReusedIdentity,
	/// A new identity was attached to the signed-in caller.
	LinkedToCaller,
	/// A user was found or created from the `email` claim.
	UpsertedByEmail,
}

/// Outcome of [`IdentityResolver::resolve`].
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedIdentity {
	/// User the session should be issued for.
	pub user: User,
	/// Identity row after the claims refresh.
	pub identity: Identity,
	/// Resolution branch taken.
	pub resolution: Resolution,
}

/// User profile together with its linked identities.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UserData {
	/// User id.
	pub id: UserId,
	/// User email.
	pub email: String,
	/// Linked external identities.
	pub identities: Vec<Identity>,
}

/// Resolves ID token subjects to local users and keeps identity rows current.
#[derive(Clone, Debug)]
pub struct IdentityResolver {
	store: Arc<dyn PersistenceGateway>,
}
impl IdentityResolver {
	/// Create a resolver over the given store.
	pub fn new(store: Arc<dyn PersistenceGateway>) -> Self {
		Self { store }
	}

	/// Decide which user the login belongs to, then upsert the identity with the fresh claims.
	///
	/// | identity exists | caller signed in | result                                   |
	/// |-----------------|------------------|------------------------------------------|
	/// | yes, owner = caller | yes          | caller                                   |
	/// | yes, other owner    | yes          | [`Error::AccountAlreadyLinked`]          |
	/// | yes                 | no           | identity owner                           |
	/// | no                  | yes          | caller; identity linked to them          |
	/// | no                  | no           | user upserted by `email`                 |
	#[tracing::instrument(skip(self, claims), fields(provider = %provider_id, caller = ?current_user))]
	pub async fn resolve(
		&self,
		provider_id: &str,
		claims: &IdTokenClaims,
		current_user: Option<UserId>,
	) -> Result<ResolvedIdentity> {
		let external_id = claims
			.subject()
			.filter(|sub| !sub.is_empty())
			.ok_or(Error::MissingClaim(claims::SUB))?;
		let owner = self.store.get_user_by_identity(provider_id, external_id).await?;
		let (user, resolution) = match (owner, current_user) {
			(Some(owner), Some(caller)) =>
				if owner.id == caller {
					(owner, Resolution::ReusedCaller)
				} else {
					tracing::warn!(owner = %owner.id, "identity is linked to a different user");

					return Err(Error::AccountAlreadyLinked);
				},
			(Some(owner), None) => (owner, Resolution::ReusedIdentity),
			(None, Some(caller)) => (self.store.get_user(caller).await?, Resolution::LinkedToCaller),
			(None, None) => {
				let email = claims
					.email()
					.filter(|email| !email.is_empty())
					.ok_or(Error::MissingClaim(claims::EMAIL))?;

				(self.store.upsert_user_by_email(email).await?, Resolution::UpsertedByEmail)
			},
		};
		let identity =
			self.store.upsert_identity(user.id, provider_id, external_id, &claims.to_value()).await?;

		tracing::info!(user = %user.id, resolution = ?resolution, "identity resolved");

		Ok(ResolvedIdentity { user, identity, resolution })
	}

	/// Load a user and all identities linked to it.
	pub async fn user_data(&self, user_id: UserId) -> Result<UserData> {
		let user = self.store.get_user(user_id).await?;
		let identities = self.store.list_identities(user_id).await?;

		Ok(UserData { id: user.id, email: user.email, identities })
	}
}

#[cfg(test)]
mod tests {
	use serde_json::{Value, json};

	use super::*;
	use crate::store::MemoryStore;

	fn claims(value: Value) -> IdTokenClaims {
		IdTokenClaims::from_map(value.as_object().cloned().expect("object literal"))
	}

	fn resolver() -> (Arc<MemoryStore>, IdentityResolver) {
		let store = Arc::new(MemoryStore::new());

		(store.clone(), IdentityResolver::new(store))
	}

	#[tokio::test]
	async fn first_login_creates_user_and_repeat_login_reuses_it() {
		let (store, resolver) = resolver();
		let token = claims(json!({ "sub": "g-1", "email": "ada@example.com", "v": 1 }));
		let first = resolver.resolve("google", &token, None).await.expect("first login");

		assert_eq!(first.resolution, Resolution::UpsertedByEmail);
		assert_eq!(first.user.email, "ada@example.com");

		let refreshed = claims(json!({ "sub": "g-1", "email": "ada@example.com", "v": 2 }));
		let second = resolver.resolve("google", &refreshed, None).await.expect("repeat login");

		assert_eq!(second.resolution, Resolution::ReusedIdentity);
		assert_eq!(second.user.id, first.user.id);
		assert_eq!(second.identity.id, first.identity.id);
		assert_eq!(second.identity.most_recent_id_token["v"], 2);
		assert_eq!(store.user_count().await, 1);
		assert_eq!(store.identity_count().await, 1);
	}

	#[tokio::test]
	async fn signed_in_caller_links_new_identity() {
		let (store, resolver) = resolver();
		let caller = store.upsert_user_by_email("caller@example.com").await.expect("caller");
		let token = claims(json!({ "sub": "gh-7", "email": "elsewhere@example.com" }));
		let resolved =
			resolver.resolve("github", &token, Some(caller.id)).await.expect("identity linked");

		assert_eq!(resolved.resolution, Resolution::LinkedToCaller);
		assert_eq!(resolved.user, caller);
		assert_eq!(store.user_count().await, 1);

		let again = resolver.resolve("github", &token, Some(caller.id)).await.expect("relogin");

		assert_eq!(again.resolution, Resolution::ReusedCaller);
	}

	#[tokio::test]
	async fn identity_owned_by_another_user_conflicts() {
		let (store, resolver) = resolver();
		let token = claims(json!({ "sub": "g-1", "email": "owner@example.com" }));

		resolver.resolve("google", &token, None).await.expect("owner login");

		let intruder = store.upsert_user_by_email("intruder@example.com").await.expect("intruder");
		let err = resolver
			.resolve("google", &token, Some(intruder.id))
			.await
			.expect_err("identity already linked");

		assert!(matches!(err, Error::AccountAlreadyLinked));
		assert_eq!(store.identity_count().await, 1);
	}

	#[tokio::test]
	async fn same_subject_at_different_providers_is_distinct() {
		let (store, resolver) = resolver();
		let token = claims(json!({ "sub": "42", "email": "same@example.com" }));
		let google = resolver.resolve("google", &token, None).await.expect("google login");
		let gitlab = resolver.resolve("gitlab", &token, None).await.expect("gitlab login");

		assert_ne!(google.identity.id, gitlab.identity.id);
		assert_eq!(google.user.id, gitlab.user.id);
		assert_eq!(store.identity_count().await, 2);
	}

	#[tokio::test]
	async fn missing_subject_or_email_is_rejected() {
		let (_, resolver) = resolver();
		let no_sub = claims(json!({ "email": "x@example.com" }));
		let no_email = claims(json!({ "sub": "1" }));

		assert!(matches!(
			resolver.resolve("google", &no_sub, None).await,
			Err(Error::MissingClaim("sub"))
		));
		assert!(matches!(
			resolver.resolve("google", &no_email, None).await,
			Err(Error::MissingClaim("email"))
		));
	}

	#[tokio::test]
	async fn user_data_lists_linked_identities() {
		let (_, resolver) = resolver();
		let token = claims(json!({ "sub": "g-1", "email": "ada@example.com" }));
		let resolved = resolver.resolve("google", &token, None).await.expect("login");
		let data = resolver.user_data(resolved.user.id).await.expect("user data");

		assert_eq!(data.email, "ada@example.com");
		assert_eq!(data.identities.len(), 1);
		assert_eq!(data.identities[0].external_id, "g-1");
	}
}
