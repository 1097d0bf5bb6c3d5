use std::future::Future;

use async_trait::async_trait;

/// Error type returned by job actions. Any `std::error::Error` converts via `?`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The zero-argument unit of work bound to a job.
///
/// Errors and panics are contained by the engine at the invocation boundary;
/// they are logged and counted but never unschedule the job.
#[async_trait]
pub trait JobAction: Send + Sync {
    async fn run(&self) -> Result<(), BoxError>;
}

/// Adapter that turns an async closure into a [`JobAction`].
pub struct FnAction<F>(F);

/// Wrap `f` so it can be bound to a job.
pub fn action_fn<F, Fut>(f: F) -> FnAction<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    FnAction(f)
}

#[async_trait]
impl<F, Fut> JobAction for FnAction<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    async fn run(&self) -> Result<(), BoxError> {
        (self.0)().await
    }
}
