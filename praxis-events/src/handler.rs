//! Event handlers

use crate::error::EventHandlerError;
use crate::event::DomainEvent;
use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// A module's reaction to one event type.
///
/// Called once per delivery attempt. Returning an error (or panicking)
/// schedules a retry under the bus's [`RetryPolicy`](crate::RetryPolicy).
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &DomainEvent) -> Result<(), EventHandlerError>;
}

#[async_trait]
impl<H: EventHandler + ?Sized> EventHandler for Arc<H> {
    async fn handle(&self, event: &DomainEvent) -> Result<(), EventHandlerError> {
        (**self).handle(event).await
    }
}

/// Adapts an async closure taking an owned event.
pub struct FnHandler<F, Fut> {
    f: F,
    _marker: PhantomData<fn() -> Fut>,
}

impl<F, Fut> FnHandler<F, Fut>
where
    F: Fn(DomainEvent) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), EventHandlerError>> + Send,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F, Fut>
where
    F: Fn(DomainEvent) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), EventHandlerError>> + Send,
{
    async fn handle(&self, event: &DomainEvent) -> Result<(), EventHandlerError> {
        (self.f)(event.clone()).await
    }
}
