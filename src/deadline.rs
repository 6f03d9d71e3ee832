//! Caller-supplied deadlines for any step of the flow.

// std
use std::future::Future;
// self
use crate::_prelude::*;

/// Run `future`, failing with [`Error::DeadlineExceeded`] once `limit` elapses.
///
/// Dropping the future cancels the step; a persisted write already acknowledged by the store
/// stays in place.
pub async fn within<F, T>(limit: Duration, future: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	match tokio::time::timeout(limit, future).await {
		Ok(result) => result,
		Err(_) => {
			tracing::warn!(limit = ?limit, "deadline exceeded");

			Err(Error::DeadlineExceeded(limit))
		},
	}
}
