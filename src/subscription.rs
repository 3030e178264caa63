//! Realtime subscription handle.
//!
//! `on` returns a [`Subscription`]: a stream of re-emissions plus an explicit
//! close signal that tears down the backend listener. Dropping the handle
//! closes it too, so listener resources never outlive the consumer.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::oneshot;

use crate::error::Result;
use crate::response::Response;

/// Boxed stream of normalized responses, the output type of every verb.
pub type ResponseStream = Pin<Box<dyn Stream<Item = Result<Response>> + Send>>;

/// Handle to a live realtime feed.
pub struct Subscription {
    stream: ResponseStream,
    close: Option<oneshot::Sender<()>>,
}

impl Subscription {
    pub(crate) fn new(stream: ResponseStream, close: oneshot::Sender<()>) -> Self {
        Self {
            stream,
            close: Some(close),
        }
    }

    /// Close the feed. The stream ends after any item already in flight.
    /// Idempotent.
    pub fn close(&mut self) {
        if let Some(signal) = self.close.take() {
            let _ = signal.send(());
        }
    }

    pub fn is_closed(&self) -> bool {
        self.close.is_none()
    }
}

impl Stream for Subscription {
    type Item = Result<Response>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.stream).poll_next(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.is_closed())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
