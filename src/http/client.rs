//! HTTP client integration for provider discovery retrieval.

// std
use std::fmt::Debug;
// crates.io
use async_trait::async_trait;
use http::{
	HeaderMap, StatusCode,
	header::{ACCEPT, CACHE_CONTROL},
};
use reqwest::{Client, redirect::Policy};
use url::Url;
// self
use crate::{_prelude::*, config::DEFAULT_MAX_RESPONSE_BYTES, security};

/// Maximum redirect depth followed by the default client.
pub const MAX_REDIRECTS: usize = 10;

/// Raw discovery response handed to the cache for parsing and freshness evaluation.
#[derive(Clone, Debug)]
pub struct DiscoveryResponse {
	/// Upstream status; always a success for responses returned by [`ReqwestTransport`].
	pub status: StatusCode,
	/// Response headers, used for `Cache-Control`/`Expires` evaluation.
	pub headers: HeaderMap,
	/// Response body.
	pub body: Vec<u8>,
	/// Round-trip duration of the exchange.
	pub elapsed: Duration,
}

/// Retrieves discovery documents.
#[async_trait]
pub trait DiscoveryTransport: Send + Sync + Debug {
	/// Fetch the document at `url`.
	async fn fetch(&self, url: &Url) -> Result<DiscoveryResponse>;
}

/// [`DiscoveryTransport`] backed by `reqwest`.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
	client: Client,
	require_https: bool,
	max_response_bytes: u64,
}
impl ReqwestTransport {
	/// Build a transport with the default client.
	pub fn new(require_https: bool) -> Result<Self> {
		Ok(Self::with_client(default_client()?, require_https))
	}

	/// Build a transport using the supplied HTTP client (primarily for tests).
	pub fn with_client(client: Client, require_https: bool) -> Self {
		Self { client, require_https, max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES }
	}

	/// Override the response size guard.
	pub fn with_max_response_bytes(mut self, max_response_bytes: u64) -> Self {
		self.max_response_bytes = max_response_bytes;

		self
	}
}
#[async_trait]
impl DiscoveryTransport for ReqwestTransport {
	async fn fetch(&self, url: &Url) -> Result<DiscoveryResponse> {
		if self.require_https {
			security::enforce_https(url)?;
		}

		let start = Instant::now();
		let response =
			self.client.get(url.clone()).header(ACCEPT, "application/json").send().await?;
		let elapsed = start.elapsed();
		let status = response.status();
		let headers = response.headers().clone();

		if !status.is_success() {
			let body = response.text().await.ok();

			return Err(Error::HttpStatus { status, url: url.clone(), body });
		}

		let bytes = response.bytes().await?;

		if bytes.len() as u64 > self.max_response_bytes {
			return Err(Error::Validation {
				field: "max_response_bytes",
				reason: format!(
					"Response size {size} bytes exceeds the configured guard of {limit} bytes.",
					size = bytes.len(),
					limit = self.max_response_bytes
				),
			});
		}

		tracing::debug!(
			url = %url,
			status = %status,
			elapsed = ?elapsed,
			cache_control = ?cache_control_header(&headers),
			"discovery fetch complete"
		);

		Ok(DiscoveryResponse { status, headers, body: bytes.to_vec(), elapsed })
	}
}

/// Client shared by discovery and token requests.
///
/// No request timeout is set; callers bound each step with [`crate::deadline::within`].
pub fn default_client() -> Result<Client> {
	Ok(Client::builder()
		.redirect(Policy::limited(MAX_REDIRECTS))
		.user_agent(format!("oidc-session/{}", env!("CARGO_PKG_VERSION")))
		.build()?)
}

/// Extract cache-control header as string for diagnostics.
pub fn cache_control_header(headers: &HeaderMap) -> Option<String> {
	headers.get(CACHE_CONTROL).and_then(|value| value.to_str().ok()).map(|s| s.to_string())
}
