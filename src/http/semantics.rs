//! Freshness evaluation for discovery responses.
//!
//! Responses carrying `Cache-Control` are evaluated with an HTTP cache policy, so `max-age` wins
//! over `Expires` and `no-store` makes the document immediately stale. Without `Cache-Control`,
//! an `Expires` header sets the expiry directly; a value that cannot be parsed is logged and
//! ignored. A response with neither header is cached until explicitly invalidated.

// std
use std::time::SystemTime;
// crates.io
use http::{
	HeaderMap, Method, Request, Response, StatusCode, Uri,
	header::{ACCEPT, CACHE_CONTROL, EXPIRES},
};
use http_cache_semantics::{CacheOptions, CachePolicy};
use url::Url;
// self
use crate::_prelude::*;

/// Header that determined a document's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FreshnessSource {
	/// `Cache-Control`, evaluated as an HTTP cache policy.
	CacheControl,
	/// `Expires` header alone.
	Expires,
	/// No usable header; the document never expires.
	Unbounded,
}

/// Freshness evaluation derived from HTTP headers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Freshness {
	/// Instant after which the cached document must be refetched.
	pub expires_at: Option<DateTime<Utc>>,
	/// Header that produced `expires_at`.
	pub source: FreshnessSource,
}

/// Build the request a discovery fetch for `url` corresponds to.
pub fn base_request(url: &Url) -> Result<Request<()>> {
	let uri = url.as_str().parse::<Uri>().map_err(|err| Error::Validation {
		field: "discovery_url",
		reason: format!("Failed to convert URL to http::Uri: {err}."),
	})?;

	Request::builder()
		.method(Method::GET)
		.uri(uri)
		.header(ACCEPT, "application/json")
		.body(())
		.map_err(Error::from)
}

/// Evaluate the response headers of a fetch of `url` completed at `fetched_at`.
pub fn evaluate_freshness(
	url: &Url,
	status: StatusCode,
	headers: &HeaderMap,
	fetched_at: DateTime<Utc>,
) -> Result<Freshness> {
	if headers.contains_key(CACHE_CONTROL) {
		let request = base_request(url)?;
		let mut response = Response::new(());

		*response.status_mut() = status;
		*response.headers_mut() = headers.clone();

		let ttl = policy_ttl(&request, &response, fetched_at.into());
		let expires_at = TimeDelta::from_std(ttl)
			.ok()
			.and_then(|ttl| fetched_at.checked_add_signed(ttl));

		tracing::debug!(ttl = ?ttl, "freshness from cache policy");

		return Ok(Freshness { expires_at, source: FreshnessSource::CacheControl });
	}
	if let Some(expires_at) = expires_header(headers) {
		return Ok(Freshness { expires_at: Some(expires_at), source: FreshnessSource::Expires });
	}

	Ok(Freshness { expires_at: None, source: FreshnessSource::Unbounded })
}

fn policy_ttl(request: &Request<()>, response: &Response<()>, now: SystemTime) -> Duration {
	let options = CacheOptions { shared: false, ..Default::default() };
	let policy = CachePolicy::new_options(request, response, now, options);

	if policy.is_storable() { policy.time_to_live(now) } else { Duration::ZERO }
}

fn expires_header(headers: &HeaderMap) -> Option<DateTime<Utc>> {
	let raw = headers.get(EXPIRES)?;
	let parsed = raw
		.to_str()
		.ok()
		.and_then(|value| httpdate::parse_http_date(value.trim()).ok())
		.map(DateTime::<Utc>::from);

	if parsed.is_none() {
		tracing::warn!(expires = ?raw, "unparsable Expires header; caching without expiry");
	}

	parsed
}
