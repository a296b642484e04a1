use std::fmt::Display;
use std::future::Future;

/// Runs `operation`, and if it fails runs it exactly once more.
///
/// The second outcome is returned as is. `operation` receives the attempt
/// number (1 or 2). `label` identifies the work in the warning logged after
/// the first failure.
pub async fn retry_once<T, E, F, Fut>(label: &str, mut operation: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    match operation(1).await {
        Ok(value) => Ok(value),
        Err(first) => {
            tracing::warn!(error = %first, "{} failed, retrying once", label);
            operation(2).await
        }
    }
}
