//! HTTP helpers for discovery retrieval and freshness semantics.

pub mod client;
pub mod semantics;
