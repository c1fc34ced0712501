//! Ordered transmission queue
//!
//! Items are appended at the tail and transmitted one at a time from the
//! head, in submission order. A transmission task is spawned only when the
//! queue goes from empty to non-empty; that task keeps draining until it
//! pops the last item. Callers get a [`Completion`] per item but never have
//! to await it for delivery to happen.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use glimpse_core::{DumpContainer, Node};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tokio::sync::Notify;

use crate::codec::{Codec, JsonCodec};
use crate::error::{Error, Result};
use crate::transport::{Endpoint, Transport};

/// What a queue item asks the viewer to do
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    SendPayload(Bytes),
    Clear,
}

struct Item {
    id: u64,
    intent: Intent,
    endpoint: Endpoint,
    done: oneshot::Sender<Result<()>>,
}

impl Item {
    fn job(&self) -> Job {
        Job {
            id: self.id,
            intent: self.intent.clone(),
            endpoint: self.endpoint.clone(),
        }
    }
}

/// Copy of the head item, transmitted outside the lock
#[derive(Clone)]
struct Job {
    id: u64,
    intent: Intent,
    endpoint: Endpoint,
}

struct Shared {
    items: Mutex<VecDeque<Item>>,
    transport: Arc<dyn Transport>,
    timeout: Mutex<Option<Duration>>,
    idle: Notify,
    next_id: AtomicU64,
}

/// FIFO queue of pending viewer requests
pub struct TransmissionQueue<C = JsonCodec> {
    shared: Arc<Shared>,
    codec: C,
    runtime: Handle,
}

impl TransmissionQueue<JsonCodec> {
    /// Create a queue delivering JSON payloads through `transport`
    ///
    /// Must be called from within a tokio runtime; transmissions are
    /// spawned onto it.
    pub fn new(transport: impl Transport + 'static) -> Result<Self> {
        Self::with_codec(transport, JsonCodec)
    }
}

impl<C: Codec> TransmissionQueue<C> {
    pub fn with_codec(transport: impl Transport + 'static, codec: C) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;

        Ok(Self {
            shared: Arc::new(Shared {
                items: Mutex::new(VecDeque::new()),
                transport: Arc::new(transport),
                timeout: Mutex::new(None),
                idle: Notify::new(),
                next_id: AtomicU64::new(1),
            }),
            codec,
            runtime,
        })
    }

    /// Queue a canonical tree for display
    pub fn submit(
        &self,
        node: Node,
        title: Option<String>,
        source: Option<String>,
        endpoint: Endpoint,
    ) -> Completion {
        let container = DumpContainer::tree(node)
            .with_title(title)
            .with_source(source);

        match self.codec.encode(&container) {
            Ok(payload) => self.push(Intent::SendPayload(payload.into()), endpoint),
            Err(err) => Completion::settled(Err(err)),
        }
    }

    /// Queue a markup snippet for display
    ///
    /// Fails before anything is queued if `markup` is not valid UTF-8.
    pub fn submit_markup(
        &self,
        markup: impl AsRef<[u8]>,
        title: Option<String>,
        endpoint: Endpoint,
    ) -> Result<Completion> {
        let markup = validate_markup(markup.as_ref())?;
        let container = DumpContainer::markup(markup).with_title(title);
        let payload = self.codec.encode(&container)?;
        Ok(self.push(Intent::SendPayload(payload.into()), endpoint))
    }

    /// Queue a clear request
    ///
    /// Every pending item except the head is dropped and settled as
    /// succeeded without being sent: clearing the viewer makes them moot.
    /// The head may already be on the wire, so it is left alone.
    pub fn request_clear(&self, endpoint: Endpoint) -> Completion {
        let (done, rx) = oneshot::channel();
        let id = self.next_id();

        let start = {
            let mut items = self.shared.items.lock();
            if items.len() > 1 {
                let superseded = items.drain(1..).collect::<Vec<_>>();
                tracing::debug!(count = superseded.len(), "clear supersedes pending items");
                for item in superseded {
                    let _ = item.done.send(Ok(()));
                }
            }

            items.push_back(Item {
                id,
                intent: Intent::Clear,
                endpoint,
                done,
            });
            items.len() == 1
        };

        if start {
            self.start();
        }
        Completion::new(rx)
    }

    /// Set the timeout applied to each transmission from now on
    pub fn set_timeout(&self, timeout: Option<Duration>) {
        *self.shared.timeout.lock() = timeout;
    }

    pub fn timeout(&self) -> Option<Duration> {
        *self.shared.timeout.lock()
    }

    /// Items not yet settled, including the one in flight
    pub fn len(&self) -> usize {
        self.shared.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until every queued item has settled
    pub async fn idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_empty() {
                return;
            }
            notified.await;
        }
    }

    fn next_id(&self) -> u64 {
        self.shared.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn push(&self, intent: Intent, endpoint: Endpoint) -> Completion {
        let (done, rx) = oneshot::channel();
        let id = self.next_id();

        let start = {
            let mut items = self.shared.items.lock();
            items.push_back(Item {
                id,
                intent,
                endpoint,
                done,
            });
            items.len() == 1
        };

        tracing::debug!(item = id, "queued");
        if start {
            self.start();
        }
        Completion::new(rx)
    }

    fn start(&self) {
        self.runtime.spawn(consume(self.shared.clone()));
    }
}

fn validate_markup(markup: &[u8]) -> Result<&str> {
    std::str::from_utf8(markup).map_err(|e| Error::InvalidMarkup(e.to_string()))
}

/// Transmit head items until the queue is empty
///
/// This task is the only place items leave the head, and it decides to
/// stop under the same lock that pops the last item, so at most one
/// transmission is ever in flight.
async fn consume(shared: Arc<Shared>) {
    let mut next = shared.items.lock().front().map(Item::job);

    while let Some(job) = next {
        let outcome = exchange(&shared, &job).await;
        match &outcome {
            Ok(()) => tracing::debug!(item = job.id, endpoint = %job.endpoint, "delivered"),
            Err(err) => tracing::warn!(item = job.id, endpoint = %job.endpoint, error = %err, "delivery failed"),
        }

        next = {
            let mut items = shared.items.lock();
            if let Some(item) = items.pop_front() {
                let _ = item.done.send(outcome);
            }
            items.front().map(Item::job)
        };
    }

    shared.idle.notify_waiters();
}

/// Run one transmission on its own task; a panic fails only that item
async fn exchange(shared: &Arc<Shared>, job: &Job) -> Result<()> {
    match tokio::spawn(transmit(shared.clone(), job.clone())).await {
        Ok(outcome) => outcome,
        Err(err) => Err(Error::Transport(format!("exchange aborted: {}", err))),
    }
}

async fn transmit(shared: Arc<Shared>, job: Job) -> Result<()> {
    let exchange = async {
        match &job.intent {
            Intent::SendPayload(payload) => {
                shared
                    .transport
                    .deliver_payload(payload, &job.endpoint)
                    .await
            }
            Intent::Clear => shared.transport.deliver_clear(&job.endpoint).await,
        }
    };

    let timeout = *shared.timeout.lock();
    match timeout {
        Some(timeout) => tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| Error::Timeout)?,
        None => exchange.await,
    }
}

/// Settles when its queue item has been transmitted, failed, or superseded
///
/// Dropping a completion does not withdraw the item.
#[derive(Debug)]
pub struct Completion {
    rx: Option<oneshot::Receiver<Result<()>>>,
}

impl Completion {
    fn new(rx: oneshot::Receiver<Result<()>>) -> Self {
        Self { rx: Some(rx) }
    }

    /// A completion that has already settled
    pub fn settled(outcome: Result<()>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(outcome);
        Self::new(rx)
    }

    /// Completed without transmitting anything
    pub fn ready() -> Self {
        Self::settled(Ok(()))
    }

    /// Take the outcome if the item has settled, without waiting
    ///
    /// Once this returns `Some`, the outcome has been consumed and awaiting
    /// the completion yields an error.
    pub fn try_outcome(&mut self) -> Option<Result<()>> {
        let rx = self.rx.as_mut()?;
        let outcome = match rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Closed) => Err(Error::Dropped),
        };
        self.rx = None;
        Some(outcome)
    }
}

impl Future for Completion {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Some(rx) = self.rx.as_mut() else {
            return Poll::Ready(Err(Error::Custom("outcome already taken".to_string())));
        };

        let outcome = match Pin::new(rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => outcome,
            Poll::Ready(Err(_)) => Err(Error::Dropped),
            Poll::Pending => return Poll::Pending,
        };
        self.rx = None;
        Poll::Ready(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markup_must_be_utf8() {
        assert_eq!(validate_markup(b"<p>ok</p>").unwrap(), "<p>ok</p>");
        assert!(matches!(
            validate_markup(&[0xff, 0xfe]),
            Err(Error::InvalidMarkup(_))
        ));
    }

    #[test]
    fn queue_needs_a_runtime() {
        struct Never;

        #[async_trait::async_trait]
        impl Transport for Never {
            async fn deliver_payload(&self, _: &[u8], _: &Endpoint) -> Result<()> {
                Ok(())
            }

            async fn deliver_clear(&self, _: &Endpoint) -> Result<()> {
                Ok(())
            }
        }

        assert!(matches!(TransmissionQueue::new(Never), Err(Error::NoRuntime)));
    }

    #[tokio::test]
    async fn settled_completion_resolves_immediately() {
        let mut completion = Completion::ready();
        assert!(matches!(completion.try_outcome(), Some(Ok(()))));
        assert!(Completion::settled(Err(Error::Timeout)).await.is_err());
    }
}
