//! Process-wide discovery document cache.

pub mod entry;
pub mod manager;
