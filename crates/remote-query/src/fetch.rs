//! The fetch operation driven by a view.

use std::future::Future;

use async_trait::async_trait;

use crate::error::FetchError;

/// An asynchronous operation producing the data of a query.
///
/// Implemented for any `Fn() -> impl Future<Output = Result<T, FetchError>>`
/// closure, so most callers never name this trait:
///
/// ```ignore
/// view.observe(key, move || {
///     let client = client.clone();
///     async move { client.get_json::<Vec<Incident>>("/incidents", &[]).await }
/// });
/// ```
///
/// A view keeps the fetch of its current key so `retry()` and delayed
/// refetches can invoke it again.
#[async_trait]
pub trait Fetch<T>: Send + Sync + 'static {
    /// Run the operation once.
    async fn fetch(&self) -> Result<T, FetchError>;
}

#[async_trait]
impl<T, F, Fut> Fetch<T> for F
where
    T: Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
{
    async fn fetch(&self) -> Result<T, FetchError> {
        (self)().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Fixed(u32);

    #[async_trait]
    impl Fetch<u32> for Fixed {
        async fn fetch(&self) -> Result<u32, FetchError> {
            Ok(self.0)
        }
    }

    #[tokio::test]
    async fn closures_and_structs_are_fetches() {
        let closure: Arc<dyn Fetch<u32>> = Arc::new(|| async { Ok::<_, FetchError>(1u32) });
        let fixed: Arc<dyn Fetch<u32>> = Arc::new(Fixed(2));

        assert_eq!(closure.fetch().await, Ok(1));
        assert_eq!(fixed.fetch().await, Ok(2));
    }

    #[tokio::test]
    async fn closures_can_fail() {
        let failing = || async { Err::<u32, _>(FetchError::api(400, "bad filter")) };
        assert_eq!(
            failing.fetch().await,
            Err(FetchError::api(400, "bad filter"))
        );
    }
}
