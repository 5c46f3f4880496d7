use crate::core::CancelOnDrop;
use bytes::Bytes;
use futures::stream::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A relayed response body that cancels its request when dropped early.
///
/// Reaching the end of the inner stream marks the request completed, so only
/// a drop before that point (the client went away) counts as a disconnect.
pub struct DisconnectStream<S> {
    pub stream: S,
    pub guard: CancelOnDrop,
    pub provider: String,
}

impl<S, E> Stream for DisconnectStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    type Item = Result<Bytes, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let poll = Pin::new(&mut self.stream).poll_next(cx);
        match &poll {
            Poll::Ready(None) => self.guard.handle().mark_completed(),
            Poll::Ready(Some(Err(e))) => {
                tracing::warn!(provider = %self.provider, error = %e, "Upstream body stream failed");
            }
            _ => {}
        }
        poll
    }
}

impl<S> Drop for DisconnectStream<S> {
    fn drop(&mut self) {
        // The guard cancels the request pump once this returns
        if !self.guard.handle().is_completed() {
            tracing::info!(
                provider = %self.provider,
                "Client disconnect detected - upstream stream cancelled"
            );
        }
    }
}
