//! Cancellation utilities
//!
//! First-class cancellation handles for in-flight generations.

use futures::Stream;
use tokio_util::sync::CancellationToken;

/// A handle that can be used to request cancellation.
///
/// Cloned handles share one token, observable synchronously
/// (`is_cancelled`) and asynchronously (`cancelled().await`).
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Streams wrapped with this handle stop at the
    /// next poll and drop their source, closing the HTTP connection so the
    /// provider stops generating tokens.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

/// Stop `stream` as soon as `handle` is cancelled, even while it is waiting
/// on the network.
pub fn make_cancellable_stream<S>(
    stream: S,
    handle: CancelHandle,
) -> impl Stream<Item = S::Item> + Send
where
    S: Stream + Send + 'static,
    S::Item: Send,
{
    async_stream::stream! {
        use futures::StreamExt;
        let mut inner = Box::pin(stream);
        loop {
            if handle.is_cancelled() {
                break;
            }
            let next = tokio::select! {
                biased;
                _ = handle.cancelled() => None,
                item = inner.next() => item,
            };
            match next {
                Some(item) => yield item,
                None => break,
            }
        }
    }
}
