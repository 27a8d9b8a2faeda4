//! Query cancellation and timeout.
//!
//! Each statement owns a [`Canceller`]. Its state moves
//! `Idle -> InQuery -> (Cancelling -> Cancelled) -> Idle` with atomic
//! compare and swap, so a cancel only reaches the server while the
//! statement is in a query, and at most once per query.
//!
//! A timeout spawns a timer task. Whoever clears the timer slot first
//! wins: the timer by storing [`FIRED`], the completing query by storing
//! zero. When the timer won, the completing query waits until the cancel
//! request was sent before the statement can be reused.
use std::{
    fmt,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::{sync::Notify, task::JoinHandle};

use crate::{
    common::{log_warn, verbose},
    executor::CancelSender,
};

const IDLE: u8 = 0;
const IN_QUERY: u8 = 1;
const CANCELLING: u8 = 2;
const CANCELLED: u8 = 3;

/// Timer slot value once the timer claimed it.
const FIRED: u64 = u64::MAX;

/// Cancellation state of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelState {
    Idle,
    InQuery,
    Cancelling,
    Cancelled,
}

impl CancelState {
    fn from_u8(state: u8) -> CancelState {
        match state {
            IN_QUERY => CancelState::InQuery,
            CANCELLING => CancelState::Cancelling,
            CANCELLED => CancelState::Cancelled,
            _ => CancelState::Idle,
        }
    }
}

struct Shared<C> {
    state: AtomicU8,
    /// Zero, the generation of the pending timer, or [`FIRED`].
    timer: AtomicU64,
    generation: AtomicU64,
    task: Mutex<Option<JoinHandle<()>>>,
    timed_out: AtomicBool,
    notify: Notify,
    /// Connection wide, one cancel request at a time.
    lock: Arc<tokio::sync::Mutex<()>>,
    sender: C,
}

/// Handle to interrupt the query of a statement.
///
/// Cheap to clone, can be moved to another task.
pub struct Canceller<C> {
    shared: Arc<Shared<C>>,
}

impl<C: CancelSender> Canceller<C> {
    pub(crate) fn new(sender: C, lock: Arc<tokio::sync::Mutex<()>>) -> Canceller<C> {
        Canceller {
            shared: Arc::new(Shared {
                state: AtomicU8::new(IDLE),
                timer: AtomicU64::new(0),
                generation: AtomicU64::new(0),
                task: Mutex::new(None),
                timed_out: AtomicBool::new(false),
                notify: Notify::new(),
                lock,
                sender,
            }),
        }
    }

    pub fn state(&self) -> CancelState {
        CancelState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    /// Returns `true` if the last query was interrupted by its timeout.
    pub fn timed_out(&self) -> bool {
        self.shared.timed_out.load(Ordering::Acquire)
    }

    /// Interrupt the running query.
    ///
    /// Returns `false` without contacting the server when no query is
    /// running or another cancel is already in flight.
    pub async fn cancel(&self) -> bool {
        self.shared.cancel().await
    }

    /// Enter a query, arming the timer when `timeout` is given.
    pub(crate) fn start(&self, timeout: Option<Duration>) {
        let shared = &self.shared;
        shared.cleanup_timer();
        shared.timed_out.store(false, Ordering::Release);
        shared.state.store(IN_QUERY, Ordering::Release);

        let Some(timeout) = timeout.filter(|t| !t.is_zero()) else {
            return;
        };

        let generation = shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
        shared.timer.store(generation, Ordering::Release);

        let task = tokio::spawn({
            let shared = shared.clone();
            async move {
                tokio::time::sleep(timeout).await;
                if shared
                    .timer
                    .compare_exchange(generation, FIRED, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    verbose!(?timeout, "query timeout fired");
                    shared.timed_out.store(true, Ordering::Release);
                    shared.cancel().await;
                }
            }
        });
        *shared.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
    }

    /// Leave the query.
    ///
    /// If a cancel is in flight, waits until it was sent, so it cannot hit
    /// the next query on the connection.
    pub(crate) async fn finish(&self) {
        let shared = &self.shared;
        let clear = shared.cleanup_timer();
        if clear
            && shared
                .state
                .compare_exchange(IN_QUERY, IDLE, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            return;
        }

        verbose!("waiting for cancel request");
        loop {
            let notified = shared.notify.notified();
            let mut notified = std::pin::pin!(notified);
            notified.as_mut().enable();
            if shared
                .state
                .compare_exchange(CANCELLED, IDLE, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return;
            }
            notified.await;
        }
    }

    /// Disarm the timer without waiting, for statements going away.
    pub(crate) fn stop_timer(&self) {
        self.shared.cleanup_timer();
    }
}

impl<C: CancelSender> Shared<C> {
    /// Returns `true` when no timer can fire anymore.
    fn cleanup_timer(&self) -> bool {
        match self.timer.swap(0, Ordering::AcqRel) {
            0 => true,
            FIRED => false,
            _ => {
                if let Some(task) = self.task.lock().unwrap_or_else(PoisonError::into_inner).take() {
                    task.abort();
                }
                true
            }
        }
    }

    async fn cancel(&self) -> bool {
        if self.state.load(Ordering::Acquire) == IDLE {
            return false;
        }
        if self
            .state
            .compare_exchange(IN_QUERY, CANCELLING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let _done = Done(self);
        let _lock = self.lock.lock().await;
        verbose!("sending cancel request");
        if let Err(_err) = self.sender.send_cancel_request().await {
            log_warn!("failed to send cancel request: {_err}");
        }
        true
    }
}

/// Marks the state cancelled even if the send is dropped midway.
struct Done<'a, C>(&'a Shared<C>);

impl<C> Drop for Done<'_, C> {
    fn drop(&mut self) {
        self.0.state.store(CANCELLED, Ordering::Release);
        self.0.notify.notify_waiters();
    }
}

impl<C> Clone for Canceller<C> {
    fn clone(&self) -> Self {
        Self { shared: self.shared.clone() }
    }
}

impl<C> fmt::Debug for Canceller<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Canceller")
            .field("state", &CancelState::from_u8(self.shared.state.load(Ordering::Relaxed)))
            .finish()
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::Result;

    #[derive(Clone, Default)]
    struct Counter {
        sent: Arc<AtomicUsize>,
        delay: Duration,
    }

    impl CancelSender for Counter {
        async fn send_cancel_request(&self) -> Result<()> {
            tokio::time::sleep(self.delay).await;
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn canceller(delay: Duration) -> (Canceller<Counter>, Arc<AtomicUsize>) {
        let counter = Counter { delay, ..Default::default() };
        let sent = counter.sent.clone();
        (Canceller::new(counter, Arc::default()), sent)
    }

    #[tokio::test]
    async fn idle_cancel_is_noop() {
        let (c, sent) = canceller(Duration::ZERO);
        assert!(!c.cancel().await);
        assert_eq!(c.state(), CancelState::Idle);
        assert_eq!(sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancel_once_per_query() {
        let (c, sent) = canceller(Duration::ZERO);
        c.start(None);
        assert_eq!(c.state(), CancelState::InQuery);
        assert!(c.cancel().await);
        assert_eq!(c.state(), CancelState::Cancelled);
        assert!(!c.cancel().await);

        c.finish().await;
        assert_eq!(c.state(), CancelState::Idle);
        assert!(!c.cancel().await);
        assert_eq!(sent.load(Ordering::SeqCst), 1);
        assert!(!c.timed_out());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_cancels() {
        let (c, sent) = canceller(Duration::ZERO);
        c.start(Some(Duration::from_secs(1)));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(c.state(), CancelState::Cancelled);
        assert!(c.timed_out());

        c.finish().await;
        assert_eq!(c.state(), CancelState::Idle);
        assert_eq!(sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn completion_disarms_timer() {
        let (c, sent) = canceller(Duration::ZERO);
        c.start(Some(Duration::from_secs(10)));
        c.finish().await;
        assert_eq!(c.state(), CancelState::Idle);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(c.state(), CancelState::Idle);
        assert_eq!(sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn completion_waits_for_inflight_cancel() {
        let (c, sent) = canceller(Duration::from_secs(1));
        c.start(None);
        let task = tokio::spawn({
            let c = c.clone();
            async move { c.cancel().await }
        });
        tokio::task::yield_now().await;
        assert_eq!(c.state(), CancelState::Cancelling);

        c.finish().await;
        assert_eq!(c.state(), CancelState::Idle);
        assert_eq!(sent.load(Ordering::SeqCst), 1);
        assert!(task.await.unwrap());
    }
}
