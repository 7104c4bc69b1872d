//! Handler traits and the first-settled combinator.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::select_all;
use keynav_core::errors::{self, RemoteError};
use serde_json::Value;

/// Answers inbound requests.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Produce the response payload, or reject.
    async fn handle(&self, payload: Value) -> Result<Value, RemoteError>;
}

/// Receives inbound notifications.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    /// Handle one notification. Errors are logged by the channel.
    async fn handle(&self, payload: Value) -> Result<(), RemoteError>;
}

struct RequestFn<F>(F);

#[async_trait]
impl<F, Fut> RequestHandler for RequestFn<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, RemoteError>> + Send,
{
    async fn handle(&self, payload: Value) -> Result<Value, RemoteError> {
        (self.0)(payload).await
    }
}

struct NotificationFn<F>(F);

#[async_trait]
impl<F, Fut> NotificationHandler for NotificationFn<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), RemoteError>> + Send,
{
    async fn handle(&self, payload: Value) -> Result<(), RemoteError> {
        (self.0)(payload).await
    }
}

/// Wrap an async closure as a request handler.
pub fn request_fn<F, Fut>(f: F) -> Arc<dyn RequestHandler>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, RemoteError>> + Send + 'static,
{
    Arc::new(RequestFn(f))
}

/// Wrap an async closure as a notification handler.
pub fn notification_fn<F, Fut>(f: F) -> Arc<dyn NotificationHandler>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), RemoteError>> + Send + 'static,
{
    Arc::new(NotificationFn(f))
}

/// Run every handler on `payload` and return whichever settles first.
///
/// Each handler runs as its own task. The losers are detached: they keep
/// running and their outcome is discarded. A panicking winner becomes a
/// `HANDLER_PANICKED` rejection; no handlers at all is `NO_HANDLER`.
pub async fn first_settled(
    handlers: Vec<Arc<dyn RequestHandler>>,
    payload: Value,
) -> Result<Value, RemoteError> {
    if handlers.is_empty() {
        return Err(RemoteError::new(
            errors::NO_HANDLER,
            "no request handler registered",
        ));
    }

    let tasks: Vec<_> = handlers
        .into_iter()
        .map(|handler| {
            let payload = payload.clone();
            tokio::spawn(async move { handler.handle(payload).await })
        })
        .collect();

    let (winner, _index, _detached) = select_all(tasks).await;
    winner.unwrap_or_else(|e| Err(RemoteError::new(errors::HANDLER_PANICKED, e.to_string())))
}
