//! Discovery cache keyed by discovery URL.
//!
//! Reads take a shared lock. A miss takes the per-URL fetch guard, re-checks the cache, and only
//! then performs the upstream fetch, so concurrent first callers for one URL share a single
//! request while different URLs never wait on each other. Failed fetches never touch the cache.

// std
use std::{
	collections::HashMap,
	sync::{Mutex as StdMutex, PoisonError},
};
// crates.io
use tokio::sync::{Mutex, RwLock};
use url::Url;
// self
use crate::{
	_prelude::*,
	cache::entry::CacheEntry,
	clock::{Clock, SystemClock},
	http::{
		client::{DiscoveryTransport, ReqwestTransport},
		semantics::evaluate_freshness,
	},
	metrics::{self, DiscoveryMetrics},
	oidc::metadata::ProviderMetadata,
};

type FetchGuards = HashMap<String, Arc<Mutex<()>>>;

/// Shared, process-wide cache of provider discovery documents.
///
/// Clones share the same entries, fetch guards, and metrics.
#[derive(Clone, Debug)]
pub struct DiscoveryCache {
	transport: Arc<dyn DiscoveryTransport>,
	clock: Arc<dyn Clock>,
	entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
	fetch_guards: Arc<StdMutex<FetchGuards>>,
	metrics: Arc<DiscoveryMetrics>,
}
impl DiscoveryCache {
	/// Build a cache with the default reqwest transport and system clock.
	pub fn new(require_https: bool) -> Result<Self> {
		Ok(Self::with_parts(Arc::new(ReqwestTransport::new(require_https)?), Arc::new(SystemClock)))
	}

	/// Build a cache over the supplied transport and clock (primarily for tests).
	pub fn with_parts(transport: Arc<dyn DiscoveryTransport>, clock: Arc<dyn Clock>) -> Self {
		Self {
			transport,
			clock,
			entries: Default::default(),
			fetch_guards: Default::default(),
			metrics: DiscoveryMetrics::new(),
		}
	}

	/// Access the lookup metrics accumulator.
	pub fn metrics(&self) -> Arc<DiscoveryMetrics> {
		self.metrics.clone()
	}

	/// Return the provider metadata for `url`, fetching it when absent or expired.
	#[tracing::instrument(skip(self), fields(url = %url))]
	pub async fn get(&self, url: &Url) -> Result<Arc<ProviderMetadata>> {
		let key = url.as_str();

		if let Some(metadata) = self.lookup(key).await {
			self.observe_hit(key);

			return Ok(metadata);
		}

		let guard = self.fetch_guard(key);
		let _held = guard.lock().await;

		// Another caller may have completed the fetch while this one waited.
		if let Some(metadata) = self.lookup(key).await {
			tracing::debug!("discovery fetch coalesced with concurrent caller");
			self.observe_hit(key);

			return Ok(metadata);
		}

		self.observe_miss(key);

		let start = Instant::now();
		let entry = match self.fetch(url).await {
			Ok(entry) => entry,
			Err(err) => {
				tracing::warn!(error = %err, "discovery fetch failed");
				self.observe_fetch_error(key);

				return Err(err);
			},
		};
		let metadata = entry.metadata().clone();

		self.observe_fetch_success(key, start.elapsed());
		self.entries.write().await.insert(key.to_owned(), entry);

		Ok(metadata)
	}

	/// Current entry for `url`, including expired ones, for status reporting.
	pub async fn entry(&self, url: &Url) -> Option<CacheEntry> {
		self.entries.read().await.get(url.as_str()).cloned()
	}

	/// Drop the cached document for `url`; returns whether one was present.
	pub async fn invalidate(&self, url: &Url) -> bool {
		self.entries.write().await.remove(url.as_str()).is_some()
	}

	async fn lookup(&self, key: &str) -> Option<Arc<ProviderMetadata>> {
		let now = self.clock.now();
		let entries = self.entries.read().await;

		entries.get(key).filter(|entry| !entry.is_expired(now)).map(|entry| entry.metadata().clone())
	}

	fn fetch_guard(&self, key: &str) -> Arc<Mutex<()>> {
		let mut guards = self.fetch_guards.lock().unwrap_or_else(PoisonError::into_inner);

		guards.entry(key.to_owned()).or_default().clone()
	}

	async fn fetch(&self, url: &Url) -> Result<CacheEntry> {
		let response = self.transport.fetch(url).await?;

		if !response.status.is_success() {
			return Err(Error::HttpStatus {
				status: response.status,
				url: url.clone(),
				body: String::from_utf8(response.body).ok(),
			});
		}

		let metadata = ProviderMetadata::from_slice(&response.body)?;
		let fetched_at = self.clock.now();
		let freshness = evaluate_freshness(url, response.status, &response.headers, fetched_at)?;

		tracing::debug!(
			issuer = %metadata.issuer,
			expires_at = ?freshness.expires_at,
			source = ?freshness.source,
			elapsed = ?response.elapsed,
			"discovery document cached"
		);

		Ok(CacheEntry::new(Arc::new(metadata), fetched_at, freshness.expires_at, freshness.source))
	}

	fn observe_hit(&self, key: &str) {
		metrics::record_discovery_hit(key);

		self.metrics.record_hit();
	}

	fn observe_miss(&self, key: &str) {
		metrics::record_discovery_miss(key);

		self.metrics.record_miss();
	}

	fn observe_fetch_success(&self, key: &str, duration: Duration) {
		metrics::record_discovery_fetch_success(key, duration);

		self.metrics.record_fetch_success(duration);
	}

	fn observe_fetch_error(&self, key: &str) {
		metrics::record_discovery_fetch_error(key);

		self.metrics.record_fetch_error();
	}
}
