//! The persistence seam supplied by the surrounding application.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

/// Saves one entity. In a real deployment this is a network call.
///
/// Implementations report failure through `anyhow`; the coordinator turns it
/// into [`PersistFailure::Rejected`](crate::PersistFailure::Rejected).
#[async_trait]
pub trait Persist<E: Send + 'static>: Send + Sync {
    async fn persist(&self, entity: E) -> anyhow::Result<()>;
}

#[async_trait]
impl<E, P> Persist<E> for Arc<P>
where
    E: Send + 'static,
    P: Persist<E> + ?Sized,
{
    async fn persist(&self, entity: E) -> anyhow::Result<()> {
        (**self).persist(entity).await
    }
}

/// Adapts an async closure into a [`Persist`] implementation.
///
/// ```ignore
/// let persist = FnPersist(|variant: ProductVariant| async move {
///     client.put_variant(&variant).await
/// });
/// ```
#[derive(Debug, Clone)]
pub struct FnPersist<F>(pub F);

#[async_trait]
impl<E, F, Fut> Persist<E> for FnPersist<F>
where
    E: Send + 'static,
    F: Fn(E) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn persist(&self, entity: E) -> anyhow::Result<()> {
        (self.0)(entity).await
    }
}
