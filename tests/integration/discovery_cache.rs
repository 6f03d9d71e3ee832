//! Discovery caching against a live HTTP endpoint.

// std
use std::sync::Arc;
// crates.io
use oidc_session::{DiscoveryCache, Error, ErrorKind, Result};
use url::Url;
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{method, path},
};
// self
use crate::support::{self, DISCOVERY_PATH};

fn discovery_url(server: &MockServer) -> Url {
	Url::parse(&format!("{}{DISCOVERY_PATH}", server.uri())).expect("mock server url")
}

#[tokio::test]
async fn serves_cached_document_without_refetching() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(DISCOVERY_PATH))
		.respond_with(
			ResponseTemplate::new(200)
				.set_body_json(support::discovery_document(&server))
				.insert_header("cache-control", "public, max-age=300"),
		)
		.expect(1)
		.mount(&server)
		.await;

	let cache = DiscoveryCache::new(false)?;
	let url = discovery_url(&server);
	let first = cache.get(&url).await?;
	let second = cache.get(&url).await?;

	assert!(Arc::ptr_eq(&first, &second));
	assert_eq!(first.issuer, server.uri());
	assert_eq!(first.token_endpoint.path(), "/token");

	let entry = cache.entry(&url).await.expect("entry cached");

	assert!(entry.expires_at().is_some());
	assert_eq!(cache.metrics().snapshot().fetch_successes, 1);

	server.verify().await;

	Ok(())
}

#[tokio::test]
async fn concurrent_callers_share_one_fetch() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(DISCOVERY_PATH))
		.respond_with(
			ResponseTemplate::new(200)
				.set_body_json(support::discovery_document(&server))
				.set_delay(std::time::Duration::from_millis(100)),
		)
		.expect(1)
		.mount(&server)
		.await;

	let cache = DiscoveryCache::new(false)?;
	let url = discovery_url(&server);
	let tasks = (0..8)
		.map(|_| {
			let cache = cache.clone();
			let url = url.clone();

			tokio::spawn(async move { cache.get(&url).await })
		})
		.collect::<Vec<_>>();

	for task in tasks {
		task.await.expect("task joins")?;
	}

	server.verify().await;

	Ok(())
}

#[tokio::test]
async fn failed_fetch_is_not_cached() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(DISCOVERY_PATH))
		.respond_with(ResponseTemplate::new(503))
		.up_to_n_times(1)
		.mount(&server)
		.await;
	support::mount_discovery(&server, "max-age=60").await;

	let cache = DiscoveryCache::new(false)?;
	let url = discovery_url(&server);
	let err = cache.get(&url).await.expect_err("provider unavailable");

	assert!(matches!(&err, Error::HttpStatus { status, .. } if status.as_u16() == 503));
	assert_eq!(err.kind(), ErrorKind::TransientIo);
	assert!(err.kind().is_retryable());
	assert!(cache.entry(&url).await.is_none());

	let metadata = cache.get(&url).await?;

	assert_eq!(metadata.issuer, server.uri());

	Ok(())
}

#[tokio::test]
async fn https_is_enforced_when_required() -> Result<()> {
	let server = MockServer::start().await;
	let cache = DiscoveryCache::new(true)?;
	let err = cache.get(&discovery_url(&server)).await.expect_err("plain http rejected");

	assert_eq!(err.kind(), ErrorKind::Configuration);

	Ok(())
}
