//! The cancellation primitive threaded through every worker.
//!
//! `spec` §5 requires every worker to take a cancellation token and observe
//! it at each suspension point. `avesa-engine`'s `Context` wraps this token
//! together with the capability handles (`StateStore`, `BlobStore`, ...);
//! this crate only owns the token itself so every other crate can depend on
//! it without depending on the capability traits.

use std::future::Future;
use tokio_util::sync::CancellationToken;

use crate::error::AvesaError;

/// Run `fut` to completion unless `token` fires first, in which case return
/// `AvesaError::Cancelled` and drop `fut`.
pub async fn cancellable<T>(
    token: &CancellationToken,
    fut: impl Future<Output = T>,
) -> Result<T, AvesaError> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(AvesaError::Cancelled),
        value = fut => Ok(value),
    }
}
