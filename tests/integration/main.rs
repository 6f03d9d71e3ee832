//! Integration tests against a mock identity provider.

mod discovery_cache;
mod login_flow;
mod support;
