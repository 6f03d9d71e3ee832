//! Cached discovery document and its expiry bookkeeping.

// self
use crate::{_prelude::*, http::semantics::FreshnessSource, oidc::metadata::ProviderMetadata};

/// Discovery document cached for a single discovery URL.
#[derive(Clone, Debug)]
pub struct CacheEntry {
	metadata: Arc<ProviderMetadata>,
	fetched_at: DateTime<Utc>,
	expires_at: Option<DateTime<Utc>>,
	source: FreshnessSource,
}
impl CacheEntry {
	/// Wrap a freshly fetched document.
	pub fn new(
		metadata: Arc<ProviderMetadata>,
		fetched_at: DateTime<Utc>,
		expires_at: Option<DateTime<Utc>>,
		source: FreshnessSource,
	) -> Self {
		Self { metadata, fetched_at, expires_at, source }
	}

	/// Shared handle to the cached document.
	pub fn metadata(&self) -> &Arc<ProviderMetadata> {
		&self.metadata
	}

	/// Wall-clock time of the fetch.
	pub fn fetched_at(&self) -> DateTime<Utc> {
		self.fetched_at
	}

	/// Instant after which the entry must be refetched; `None` never expires.
	pub fn expires_at(&self) -> Option<DateTime<Utc>> {
		self.expires_at
	}

	/// Header that determined `expires_at`.
	pub fn freshness_source(&self) -> FreshnessSource {
		self.source
	}

	/// Whether the entry may no longer be served at `now`.
	pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
		self.expires_at.is_some_and(|expires_at| now >= expires_at)
	}
}
