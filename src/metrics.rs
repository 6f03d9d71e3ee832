//! Metrics helpers and discovery-cache telemetry bookkeeping.
//!
//! The in-process [`DiscoveryMetrics`] accumulator is always available. Recorder-backed
//! counters and histograms are emitted only with the `metrics` feature; the Prometheus exporter
//! additionally requires `prometheus`.

// std
#[cfg(feature = "prometheus")] use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
#[cfg(feature = "metrics")] use metrics::Label;
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
#[cfg(feature = "metrics")] use smallvec::SmallVec;
// self
use crate::_prelude::*;

#[cfg(feature = "metrics")]
type LabelSet = SmallVec<[Label; 4]>;

#[cfg(feature = "metrics")]
const METRIC_DISCOVERY_REQUESTS_TOTAL: &str = "oidc_discovery_requests_total";
#[cfg(feature = "metrics")]
const METRIC_DISCOVERY_HITS_TOTAL: &str = "oidc_discovery_hits_total";
#[cfg(feature = "metrics")]
const METRIC_DISCOVERY_MISSES_TOTAL: &str = "oidc_discovery_misses_total";
#[cfg(feature = "metrics")]
const METRIC_DISCOVERY_FETCH_TOTAL: &str = "oidc_discovery_fetch_total";
#[cfg(feature = "metrics")]
const METRIC_DISCOVERY_FETCH_DURATION: &str = "oidc_discovery_fetch_duration_seconds";
#[cfg(feature = "metrics")]
const METRIC_LOGIN_TOTAL: &str = "oidc_login_total";
#[cfg(feature = "metrics")]
const METRIC_REPLAY_REJECTIONS_TOTAL: &str = "oidc_replay_rejections_total";

/// Shared Prometheus handle installed by [`install_default_exporter`].
#[cfg(feature = "prometheus")]
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Thread-safe accumulator for discovery cache lookups.
#[derive(Debug, Default)]
pub struct DiscoveryMetrics {
	total_requests: AtomicU64,
	cache_hits: AtomicU64,
	fetch_successes: AtomicU64,
	fetch_errors: AtomicU64,
	last_fetch_micros: AtomicU64,
}
impl DiscoveryMetrics {
	/// Create a new metrics accumulator.
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Record a lookup served from the cache.
	pub fn record_hit(&self) {
		self.total_requests.fetch_add(1, Ordering::Relaxed);
		self.cache_hits.fetch_add(1, Ordering::Relaxed);
	}

	/// Record a lookup that required an upstream fetch.
	pub fn record_miss(&self) {
		self.total_requests.fetch_add(1, Ordering::Relaxed);
	}

	/// Record a successful fetch and latency.
	pub fn record_fetch_success(&self, duration: Duration) {
		self.fetch_successes.fetch_add(1, Ordering::Relaxed);
		self.last_fetch_micros.store(duration.as_micros() as u64, Ordering::Relaxed);
	}

	/// Record fetch failure.
	pub fn record_fetch_error(&self) {
		self.fetch_errors.fetch_add(1, Ordering::Relaxed);
	}

	/// Take a point-in-time snapshot for status reporting.
	pub fn snapshot(&self) -> DiscoveryMetricsSnapshot {
		DiscoveryMetricsSnapshot {
			total_requests: self.total_requests.load(Ordering::Relaxed),
			cache_hits: self.cache_hits.load(Ordering::Relaxed),
			fetch_successes: self.fetch_successes.load(Ordering::Relaxed),
			fetch_errors: self.fetch_errors.load(Ordering::Relaxed),
			last_fetch_micros: match self.last_fetch_micros.load(Ordering::Relaxed) {
				0 => None,
				value => Some(value),
			},
		}
	}
}

/// Read-only snapshot of discovery telemetry counters.
#[derive(Clone, Debug)]
pub struct DiscoveryMetricsSnapshot {
	/// Total number of cache lookups observed.
	pub total_requests: u64,
	/// Count of lookups served from the cache.
	pub cache_hits: u64,
	/// Count of successful upstream fetches.
	pub fetch_successes: u64,
	/// Count of upstream fetches that failed.
	pub fetch_errors: u64,
	/// Microsecond latency of the most recent fetch.
	pub last_fetch_micros: Option<u64>,
}
impl DiscoveryMetricsSnapshot {
	/// Convenience method to compute the cache hit rate.
	pub fn hit_rate(&self) -> f64 {
		if self.total_requests == 0 {
			0.0
		} else {
			self.cache_hits as f64 / self.total_requests as f64
		}
	}
}

/// Install the default Prometheus recorder backed by `metrics`.
///
/// Multiple invocations are safe; subsequent calls become no-ops once the recorder is installed.
#[cfg(feature = "prometheus")]
pub fn install_default_exporter() -> Result<()> {
	if PROMETHEUS_HANDLE.get().is_some() {
		return Ok(());
	}

	let handle = PrometheusBuilder::new()
		.install_recorder()
		.map_err(|err| Error::Metrics(err.to_string()))?;
	let _ = PROMETHEUS_HANDLE.set(handle);

	Ok(())
}

/// Access the global Prometheus exporter handle when installed.
#[cfg(feature = "prometheus")]
pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
	PROMETHEUS_HANDLE.get()
}

/// Record a discovery lookup served from the cache.
pub fn record_discovery_hit(discovery_url: &str) {
	#[cfg(feature = "metrics")]
	{
		let labels = discovery_labels(discovery_url);

		metrics::counter!(METRIC_DISCOVERY_REQUESTS_TOTAL, labels.iter()).increment(1);
		metrics::counter!(METRIC_DISCOVERY_HITS_TOTAL, labels.iter()).increment(1);
	}
	#[cfg(not(feature = "metrics"))]
	let _ = discovery_url;
}

/// Record a discovery lookup that required an upstream fetch.
pub fn record_discovery_miss(discovery_url: &str) {
	#[cfg(feature = "metrics")]
	{
		let labels = discovery_labels(discovery_url);

		metrics::counter!(METRIC_DISCOVERY_REQUESTS_TOTAL, labels.iter()).increment(1);
		metrics::counter!(METRIC_DISCOVERY_MISSES_TOTAL, labels.iter()).increment(1);
	}
	#[cfg(not(feature = "metrics"))]
	let _ = discovery_url;
}

/// Record a successful discovery fetch along with its latency.
pub fn record_discovery_fetch_success(discovery_url: &str, duration: Duration) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			METRIC_DISCOVERY_FETCH_TOTAL,
			status_labels(discovery_labels(discovery_url), "success").iter()
		)
		.increment(1);
		metrics::histogram!(METRIC_DISCOVERY_FETCH_DURATION, discovery_labels(discovery_url).iter())
			.record(duration.as_secs_f64());
	}
	#[cfg(not(feature = "metrics"))]
	let _ = (discovery_url, duration);
}

/// Record a failed discovery fetch.
pub fn record_discovery_fetch_error(discovery_url: &str) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			METRIC_DISCOVERY_FETCH_TOTAL,
			status_labels(discovery_labels(discovery_url), "error").iter()
		)
		.increment(1);
	}
	#[cfg(not(feature = "metrics"))]
	let _ = discovery_url;
}

/// Record the outcome of a login callback; `outcome` is `success` or an error kind label.
pub fn record_login(provider: &str, outcome: &'static str) {
	#[cfg(feature = "metrics")]
	{
		let mut labels = LabelSet::with_capacity(2);

		labels.push(Label::new("provider", provider.to_owned()));
		labels.push(Label::new("outcome", outcome));

		metrics::counter!(METRIC_LOGIN_TOTAL, labels.iter()).increment(1);
	}
	#[cfg(not(feature = "metrics"))]
	let _ = (provider, outcome);
}

/// Record a rejected state or nonce.
pub fn record_replay_rejection(role: &'static str, reason: &'static str) {
	#[cfg(feature = "metrics")]
	{
		let mut labels = LabelSet::with_capacity(2);

		labels.push(Label::new("role", role));
		labels.push(Label::new("reason", reason));

		metrics::counter!(METRIC_REPLAY_REJECTIONS_TOTAL, labels.iter()).increment(1);
	}
	#[cfg(not(feature = "metrics"))]
	let _ = (role, reason);
}

#[cfg(feature = "metrics")]
fn discovery_labels(discovery_url: &str) -> LabelSet {
	let mut labels = LabelSet::with_capacity(2);

	labels.push(Label::new("discovery_url", discovery_url.to_owned()));

	labels
}

#[cfg(feature = "metrics")]
fn status_labels(mut labels: LabelSet, status: &'static str) -> LabelSet {
	labels.push(Label::new("status", status));

	labels
}
