//! Deferred visits
//!
//! A [`DeferredVisit`] is one dispatch packaged to run on another thread or
//! task. Running it consumes it, so a visit runs at most once. Its result is
//! delivered through a single-shot channel to the paired [`PendingVisit`],
//! which can be waited on from a plain thread or awaited as a future.
//!
//! ```rust,ignore
//! let (visit, pending) = engine.defer(Arc::new(Summer), tree);
//! visit.spawn()?;
//! let total = pending.wait()?;
//! ```
//!
//! There is no cancellation or timeout. A visit dropped without running, or
//! whose thread panics, resolves to [`DispatchError::Abandoned`].

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread;

use tokio::sync::oneshot;
use tracing::debug;

use crate::engine::VisitEngine;
use crate::errors::DispatchError;
use crate::extraction::Subject;

type VisitResult<R> = Result<R, DispatchError>;

/// One dispatch waiting to be run
pub struct DeferredVisit<H, R> {
    engine: Arc<VisitEngine<H, R>>,
    handler: Arc<H>,
    subject: Arc<dyn Subject>,
    sender: oneshot::Sender<VisitResult<R>>,
}

impl<H, R> DeferredVisit<H, R> {
    pub(crate) fn new(
        engine: Arc<VisitEngine<H, R>>,
        handler: Arc<H>,
        subject: Arc<dyn Subject>,
    ) -> (Self, PendingVisit<R>) {
        let (sender, receiver) = oneshot::channel();
        let visit = Self {
            engine,
            handler,
            subject,
            sender,
        };
        (
            visit,
            PendingVisit {
                receiver,
                delivered: false,
            },
        )
    }

    /// Runs the dispatch on the current thread and delivers its result
    pub fn run(self) {
        let result = self.engine.dispatch(&self.handler, self.subject.as_ref());
        if self.sender.send(result).is_err() {
            debug!(
                "Result of deferred visit {} on {:?} dropped: no one is waiting",
                self.engine, self.subject
            );
        }
    }

    /// Runs the dispatch on a new named thread
    pub fn spawn(self) -> io::Result<thread::JoinHandle<()>>
    where
        H: Send + Sync + 'static,
        R: Send + 'static,
    {
        thread::Builder::new()
            .name(format!("visit-{}", self.engine.visit_name()))
            .spawn(move || self.run())
    }

    pub fn subject(&self) -> &Arc<dyn Subject> {
        &self.subject
    }
}

/// Result of a [`DeferredVisit`], available once it has run.
///
/// The result is handed out once. After [`try_result`](Self::try_result) or
/// an await has returned it, `try_result` yields `None` and the other accessors
/// report [`DispatchError::Abandoned`].
pub struct PendingVisit<R> {
    receiver: oneshot::Receiver<VisitResult<R>>,
    delivered: bool,
}

impl<R> PendingVisit<R> {
    /// Blocks the current thread until the visit has run.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context; await
    /// the `PendingVisit` there instead.
    pub fn wait(self) -> VisitResult<R> {
        if self.delivered {
            return Err(DispatchError::Abandoned);
        }
        self.receiver.blocking_recv().unwrap_or(Err(DispatchError::Abandoned))
    }

    /// Returns the result if the visit has finished, without blocking
    pub fn try_result(&mut self) -> Option<VisitResult<R>> {
        if self.delivered {
            return None;
        }
        let result = match self.receiver.try_recv() {
            Ok(result) => result,
            Err(oneshot::error::TryRecvError::Empty) => return None,
            Err(oneshot::error::TryRecvError::Closed) => Err(DispatchError::Abandoned),
        };
        self.delivered = true;
        Some(result)
    }

    /// Whether the result has already been handed out
    pub fn is_delivered(&self) -> bool {
        self.delivered
    }
}

impl<R> Future for PendingVisit<R> {
    type Output = VisitResult<R>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let pending = self.get_mut();
        if pending.delivered {
            return Poll::Ready(Err(DispatchError::Abandoned));
        }

        let received = std::task::ready!(Pin::new(&mut pending.receiver).poll(cx));
        pending.delivered = true;
        Poll::Ready(received.unwrap_or(Err(DispatchError::Abandoned)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BoxError;
    use crate::extraction::{Slots, Visitable};
    use crate::handlers::{VisitHandler, VisitingMethods};

    struct Word {
        text: String,
    }

    impl Visitable for Word {
        fn slots(slots: &mut Slots<Self>) {
            slots.stored(0, "text", |word| &word.text);
        }
    }

    struct Counter;

    impl Counter {
        fn letters(&self, _word: &Word, text: &String) -> Result<usize, BoxError> {
            Ok(text.chars().count())
        }
    }

    impl VisitHandler for Counter {
        fn visiting_methods(methods: &mut VisitingMethods<Self>) {
            methods.visit("letters").method("letters", Self::letters);
        }
    }

    fn deferred(text: &str) -> (DeferredVisit<Counter, usize>, PendingVisit<usize>) {
        let engine = Arc::new(VisitEngine::new("letters").expect("letters visit builds"));
        let word: Arc<dyn Subject> = Arc::new(Word { text: text.to_string() });
        engine.defer(Arc::new(Counter), word)
    }

    #[test]
    fn test_result_is_delivered_after_run() {
        let (visit, mut pending) = deferred("visit");
        assert!(pending.try_result().is_none());

        visit.run();
        assert_eq!(pending.try_result().map(|r| r.ok()), Some(Some(5)));
    }

    #[test]
    fn test_result_is_handed_out_once() {
        let (visit, mut pending) = deferred("once");
        visit.run();

        assert_eq!(pending.try_result().map(|r| r.ok()), Some(Some(4)));
        assert!(pending.is_delivered());
        assert!(pending.try_result().is_none());
        assert!(matches!(pending.wait(), Err(DispatchError::Abandoned)));
    }

    #[test]
    fn test_abandoned_result_is_reported_once() {
        let (visit, mut pending) = deferred("dropped");
        drop(visit);

        assert!(matches!(pending.try_result(), Some(Err(DispatchError::Abandoned))));
        assert!(pending.try_result().is_none());
    }

    #[test]
    fn test_spawned_visit_is_waited_on() {
        let (visit, pending) = deferred("thread");
        let handle = visit.spawn().expect("thread spawns");

        assert_eq!(pending.wait().ok(), Some(6));
        handle.join().expect("visit thread completes");
    }

    #[test]
    fn test_dropped_visit_is_abandoned() {
        let (visit, pending) = deferred("never");
        drop(visit);
        assert!(matches!(pending.wait(), Err(DispatchError::Abandoned)));
    }

    #[tokio::test]
    async fn test_pending_visit_can_be_awaited() {
        let (visit, pending) = deferred("awaited");
        tokio::task::spawn_blocking(move || visit.run());

        assert_eq!(pending.await.ok(), Some(7));
    }
}
