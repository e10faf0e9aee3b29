//! gRPC client retry utilities for service-to-service communication.

use std::future::Future;
use tonic::{Code, Status};

use crate::retry::{RetryConfig, retry_with};

/// Determines if a gRPC status code is retryable.
///
/// Only codes that indicate the request never reached the handler are
/// retried; anything the remote side may have acted on is not.
pub fn is_retryable(status: &Status) -> bool {
    matches!(status.code(), Code::Unavailable | Code::ResourceExhausted)
}

/// Execute a gRPC call with retry logic.
///
/// # Example
/// ```ignore
/// let response = retry_grpc_call(&RetryConfig::quick(), "update_bill_item_status", || {
///     let mut c = client.clone();
///     let req = request.clone();
///     async move { Ok(c.update_bill_item_status(Request::new(req)).await?.into_inner()) }
/// })
/// .await?;
/// ```
pub async fn retry_grpc_call<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    f: F,
) -> Result<T, Status>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, Status>>,
{
    retry_with(config, operation_name, is_retryable, f).await
}
