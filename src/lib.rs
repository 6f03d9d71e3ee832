//! OpenID Connect authorization-code login engine: cached provider discovery, one-time
//! state/nonce enforcement, code exchange, ID-token claim checks, identity linking, and local
//! session issuance.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod cache;
pub mod clock;
pub mod config;
pub mod deadline;
pub mod flow;
pub mod http;
pub mod identity;
pub mod metrics;
pub mod oidc;
pub mod replay;
pub mod security;
pub mod session;
pub mod store;

mod error;
mod _prelude {
	pub use std::{sync::Arc, time::Duration};

	pub use chrono::{DateTime, TimeDelta, Utc};
	pub use tokio::time::Instant;

	pub use crate::{Error, Result};
}

pub use crate::{
	cache::manager::DiscoveryCache,
	clock::{Clock, FixedClock, SystemClock},
	config::{ClientConfig, NonceMode, SessionConfig},
	error::{Error, ErrorKind, Result},
	flow::{CallbackParams, LoginFlow, LoginFlowBuilder, LoginOutcome},
	identity::{IdentityResolver, Resolution, ResolvedIdentity, UserData},
	oidc::{
		authorize::{AuthorizationRedirect, RedirectBuilder},
		claims::{Audience, IdTokenClaims},
		exchange::{ClientAuthMethod, TokenExchange, TokenResponse},
		metadata::ProviderMetadata,
		validation::{ClaimError, IdTokenValidator},
	},
	replay::ReplayGuard,
	session::{SessionCookie, SessionManager, SessionState},
	store::{
		Identity, MemoryStore, PersistenceGateway, Session, StateToken, StoreError, User, UserId,
	},
};
