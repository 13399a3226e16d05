//! Single-slot in-flight request tracking

use std::fmt;
use std::future::Future;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Identifies one dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What happened to a `get` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Request sent; the outcome arrives through `deliver`/`settle`
    Started(RequestToken),
    /// A request is already in flight; nothing was sent
    Busy,
    /// Input was rejected before any request was made
    Rejected,
}

impl Dispatch {
    pub fn is_started(&self) -> bool {
        matches!(self, Dispatch::Started(_))
    }
}

struct InFlight<T> {
    token: RequestToken,
    handle: JoinHandle<()>,
    rx: oneshot::Receiver<T>,
}

/// Why a finished slot produced no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TaskLost;

/// Holds at most one in-flight request. Owned by one logical thread.
pub(crate) struct RequestSlot<T> {
    runtime: Handle,
    next_token: u64,
    in_flight: Option<InFlight<T>>,
}

impl<T: Send + 'static> RequestSlot<T> {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            next_token: 1,
            in_flight: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Spawn `fut` unless a request is already in flight
    pub fn start<F>(&mut self, fut: F) -> Option<RequestToken>
    where
        F: Future<Output = T> + Send + 'static,
    {
        if self.in_flight.is_some() {
            return None;
        }

        let token = RequestToken(self.next_token);
        self.next_token += 1;

        let (tx, rx) = oneshot::channel();
        let handle = self.runtime.spawn(async move {
            let output = fut.await;
            // Receiver is gone when the owner unsubscribed
            let _ = tx.send(output);
        });

        self.in_flight = Some(InFlight { token, handle, rx });
        Some(token)
    }

    /// Take the finished result without waiting
    pub fn try_take(&mut self) -> Option<(RequestToken, Result<T, TaskLost>)> {
        let in_flight = self.in_flight.as_mut()?;
        let result = match in_flight.rx.try_recv() {
            Ok(value) => Ok(value),
            Err(oneshot::error::TryRecvError::Empty) => return None,
            Err(oneshot::error::TryRecvError::Closed) => Err(TaskLost),
        };

        let token = in_flight.token;
        self.in_flight = None;
        Some((token, result))
    }

    /// Wait for the in-flight request, if any
    pub async fn wait(&mut self) -> Option<(RequestToken, Result<T, TaskLost>)> {
        let in_flight = self.in_flight.as_mut()?;
        let result = (&mut in_flight.rx).await.map_err(|_| TaskLost);

        let token = in_flight.token;
        self.in_flight = None;
        Some((token, result))
    }

    /// Abort the in-flight request; its result is never observed
    pub fn cancel(&mut self) -> Option<RequestToken> {
        let in_flight = self.in_flight.take()?;
        in_flight.handle.abort();
        Some(in_flight.token)
    }
}

impl<T> Drop for RequestSlot<T> {
    fn drop(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.handle.abort();
        }
    }
}
