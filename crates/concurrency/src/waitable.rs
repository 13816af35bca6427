//! Waitable: a condition-gated, observable single-value cell
//!
//! ## Design
//!
//! One `parking_lot::Mutex` guards the value, its version counter, the
//! pending waiters and the listener set. All checks and writes happen under
//! that lock, which makes `accept_if` a true compare-and-set.
//!
//! Listener callbacks run *after* the lock is released. Each change carries a
//! version number taken under the lock, and listeners only deliver versions
//! newer than the last one they saw (see `listener.rs`). A listener that
//! writes back into the same cell therefore neither deadlocks nor recurses.
//!
//! Waiter predicates, `accept_if` predicates and value factories run *under*
//! the lock and must not touch the same cell.
//!
//! ## Phases
//!
//! ```text
//! Idle ──open()──► Open ──close / shutdown()──► Shutdown
//!   └────────────shutdown()──────────────────────┘
//! ```
//!
//! Reads, writes and listener registration work in every phase. The
//! asynchronous `*_when` operations require `Open` and fail with `Closed`
//! otherwise. Shutdown is permanent: pending waiters fail with `Closed` and
//! every listener is deregistered, its guard reporting `is_closed()`.

use crate::guard::CloseGuard;
use crate::listener::Listener;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use strata_sync_core::{Error, Result, WaitConfig};
use tokio::sync::oneshot;
use tokio::time::Instant;

type WaitPredicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Open,
    Shutdown,
}

struct Waiter<T> {
    predicate: WaitPredicate<T>,
    tx: oneshot::Sender<Result<T>>,
}

struct Cell<T> {
    value: Option<T>,
    version: u64,
    phase: Phase,
    waiters: Vec<Waiter<T>>,
    listeners: Vec<Arc<Listener<T>>>,
}

/// A change to dispatch to listeners once the lock is released
struct Change<T> {
    version: u64,
    value: T,
    listeners: Vec<Arc<Listener<T>>>,
}

impl<T: Clone> Change<T> {
    fn dispatch(self) {
        for listener in self.listeners {
            listener.offer(self.version, self.value.clone());
        }
    }
}

impl<T: Clone + PartialEq> Cell<T> {
    /// Install `value`, resolving waiters it satisfies
    ///
    /// Returns `None` when the value is unchanged.
    fn install(&mut self, value: T) -> Option<Change<T>> {
        if self.value.as_ref() == Some(&value) {
            return None;
        }
        self.value = Some(value.clone());
        self.version += 1;

        let waiters = std::mem::take(&mut self.waiters);
        for waiter in waiters {
            if waiter.tx.is_closed() {
                // Abandoned by a timeout
                continue;
            }
            if (waiter.predicate)(&value) {
                let _ = waiter.tx.send(Ok(value.clone()));
            } else {
                self.waiters.push(waiter);
            }
        }

        Some(Change {
            version: self.version,
            value,
            listeners: self.listeners.clone(),
        })
    }
}

struct Shared<T> {
    cell: Mutex<Cell<T>>,
    config: WaitConfig,
    next_listener: AtomicU64,
}

#[derive(Clone, Copy)]
struct Deadline {
    at: Instant,
    requested: Duration,
}

impl Deadline {
    fn expired(&self) -> Error {
        Error::Timeout {
            timeout_ms: self.requested.as_millis() as u64,
        }
    }
}

/// Condition-gated single-value cell
///
/// Cloning a `Waitable` yields another handle to the same cell.
pub struct Waitable<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Waitable<T> {
    fn clone(&self) -> Self {
        Waitable {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Waitable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a cell holding an optional initial value
    pub fn new(initial: Option<T>) -> Self {
        Self::with_config(initial, WaitConfig::default())
    }

    /// Create a cell with an explicit timeout policy
    pub fn with_config(initial: Option<T>, config: WaitConfig) -> Self {
        Waitable {
            shared: Arc::new(Shared {
                cell: Mutex::new(Cell {
                    value: initial,
                    version: 1,
                    phase: Phase::Idle,
                    waiters: Vec::new(),
                    listeners: Vec::new(),
                }),
                config,
                next_listener: AtomicU64::new(1),
            }),
        }
    }

    /// Timeout policy of this cell
    pub fn config(&self) -> WaitConfig {
        self.shared.config
    }

    /// Activate waiting on this cell
    ///
    /// The first call moves the cell from idle to open and returns a guard
    /// whose release shuts the cell down. Any later call returns a no-op
    /// guard.
    pub fn open(&self) -> CloseGuard {
        let mut cell = self.shared.cell.lock();
        let phase = cell.phase;
        match phase {
            Phase::Idle => {
                cell.phase = Phase::Open;
                drop(cell);
                tracing::debug!("waitable opened");
                let this = self.clone();
                CloseGuard::new(move || this.shutdown())
            }
            Phase::Open => CloseGuard::noop(),
            Phase::Shutdown => {
                tracing::debug!("open on a shut down waitable ignored");
                CloseGuard::noop()
            }
        }
    }

    /// Permanently close the cell
    ///
    /// Pending waiters fail with `Closed`. Listeners are deregistered and
    /// their guards released, so subscribers see `is_closed()`. Calling this
    /// more than once has no further effect.
    pub fn shutdown(&self) {
        let (waiters, listeners) = {
            let mut cell = self.shared.cell.lock();
            if cell.phase == Phase::Shutdown {
                return;
            }
            cell.phase = Phase::Shutdown;
            (
                std::mem::take(&mut cell.waiters),
                std::mem::take(&mut cell.listeners),
            )
        };

        tracing::debug!(
            waiters = waiters.len(),
            listeners = listeners.len(),
            "waitable shut down"
        );
        for waiter in waiters {
            let _ = waiter.tx.send(Err(Error::closed("waitable shut down")));
        }
        for listener in listeners {
            listener.close();
        }
    }

    /// Check if the cell is open for waiting
    pub fn is_open(&self) -> bool {
        self.shared.cell.lock().phase == Phase::Open
    }

    /// Check if the cell has been shut down
    pub fn is_closed(&self) -> bool {
        self.shared.cell.lock().phase == Phase::Shutdown
    }

    /// Check if a value is present
    pub fn has_value(&self) -> bool {
        self.shared.cell.lock().value.is_some()
    }

    /// Current value
    ///
    /// Fails with `IllegalState` when the cell is empty.
    pub fn get(&self) -> Result<T> {
        self.shared
            .cell
            .lock()
            .value
            .clone()
            .ok_or_else(|| Error::illegal_state("waitable has no value"))
    }

    /// Current value if present and `predicate` holds; never blocks
    pub fn get_if<P>(&self, predicate: P) -> Option<T>
    where
        P: FnOnce(&T) -> bool,
    {
        let cell = self.shared.cell.lock();
        match cell.value.as_ref() {
            Some(value) if predicate(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Wait until `predicate` holds on the value
    ///
    /// Resolves with the first satisfying value, including the current one.
    /// Fails with `Closed` if the cell is not open or shuts down while
    /// waiting, and with `Timeout` once the deadline passes.
    pub async fn get_when<P>(&self, predicate: P, timeout: Option<Duration>) -> Result<T>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let deadline = self.deadline(timeout)?;
        self.wait_matching(Arc::new(predicate), deadline).await
    }

    /// Wait until `predicate` holds, then map the satisfying value
    pub async fn supply_when<P, F, R>(
        &self,
        predicate: P,
        supplier: F,
        timeout: Option<Duration>,
    ) -> Result<R>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
        F: FnOnce(&T) -> R,
    {
        let value = self.get_when(predicate, timeout).await?;
        Ok(supplier(&value))
    }

    /// Replace the value unconditionally
    ///
    /// Listeners are notified only when the new value differs from the old.
    pub fn accept(&self, value: T) {
        let change = self.shared.cell.lock().install(value);
        if let Some(change) = change {
            tracing::trace!(version = change.version, "waitable value changed");
            change.dispatch();
        }
    }

    /// Atomically replace the value with `value` if `predicate` holds
    ///
    /// An empty cell never satisfies the predicate.
    pub fn accept_if<P>(&self, predicate: P, value: T) -> Option<T>
    where
        P: FnOnce(&T) -> bool,
    {
        self.accept_if_with(predicate, move |_| value)
    }

    /// Atomically replace the value with `factory(current)` if `predicate` holds
    ///
    /// Check and set happen under one lock acquisition; no other mutation can
    /// interleave. Returns the installed value.
    pub fn accept_if_with<P, F>(&self, predicate: P, factory: F) -> Option<T>
    where
        P: FnOnce(&T) -> bool,
        F: FnOnce(&T) -> T,
    {
        let (installed, change) = {
            let mut cell = self.shared.cell.lock();
            let current = cell.value.as_ref()?;
            if !predicate(current) {
                return None;
            }
            let next = factory(current);
            let change = cell.install(next.clone());
            (next, change)
        };
        if let Some(change) = change {
            tracing::trace!(version = change.version, "waitable value changed");
            change.dispatch();
        }
        Some(installed)
    }

    /// Wait until `predicate` holds, then atomically install `factory(current)`
    ///
    /// If another writer invalidates the predicate between the wake-up and
    /// the write, waiting resumes against the original deadline.
    pub async fn accept_when<P, F>(
        &self,
        predicate: P,
        mut factory: F,
        timeout: Option<Duration>,
    ) -> Result<T>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
        F: FnMut(&T) -> T + Send,
    {
        let deadline = self.deadline(timeout)?;
        let predicate: WaitPredicate<T> = Arc::new(predicate);
        loop {
            self.wait_matching(Arc::clone(&predicate), deadline).await?;
            if let Some(installed) =
                self.accept_if_with(|current| predicate(current), |current| factory(current))
            {
                return Ok(installed);
            }
            tracing::trace!("accept_when lost a race, waiting again");
        }
    }

    /// Register a durable listener
    ///
    /// `listener` is called with the value present at registration and with
    /// every later distinct value, whenever `predicate` holds. Releasing the
    /// returned guard deregisters it. Shutdown releases the guard from the
    /// cell's side; on a cell already shut down the guard comes back closed
    /// and the listener is never called.
    pub fn notify_while<P, L>(&self, predicate: P, listener: L) -> CloseGuard
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
        L: FnMut(&T) + Send + 'static,
    {
        let id = self.shared.next_listener.fetch_add(1, Ordering::Relaxed);
        let listener = Arc::new(Listener::new(id, Box::new(predicate), Box::new(listener)));

        let shared: Weak<Shared<T>> = Arc::downgrade(&self.shared);
        let registered = Arc::clone(&listener);
        let guard = CloseGuard::new(move || {
            registered.deactivate();
            if let Some(shared) = shared.upgrade() {
                shared
                    .cell
                    .lock()
                    .listeners
                    .retain(|l| l.id() != registered.id());
            }
        });
        listener.attach(guard.slot());

        let initial = {
            let mut cell = self.shared.cell.lock();
            if cell.phase == Phase::Shutdown {
                drop(cell);
                guard.close();
                return guard;
            }
            cell.listeners.push(Arc::clone(&listener));
            cell.value.clone().map(|value| (cell.version, value))
        };
        if let Some((version, value)) = initial {
            listener.offer(version, value);
        }
        guard
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.shared.cell.lock().listeners.len()
    }

    /// Read and subscribe-only view of this cell
    pub fn notifier(&self) -> WaitableNotify<T> {
        WaitableNotify {
            inner: self.clone(),
        }
    }

    fn deadline(&self, timeout: Option<Duration>) -> Result<Option<Deadline>> {
        Ok(self
            .shared
            .config
            .resolve(timeout)?
            .map(|requested| Deadline {
                at: Instant::now() + requested,
                requested,
            }))
    }

    async fn wait_matching(
        &self,
        predicate: WaitPredicate<T>,
        deadline: Option<Deadline>,
    ) -> Result<T> {
        let rx = {
            let mut cell = self.shared.cell.lock();
            if cell.phase != Phase::Open {
                return Err(Error::closed(match cell.phase {
                    Phase::Idle => "waitable not opened",
                    _ => "waitable shut down",
                }));
            }
            if let Some(value) = cell.value.as_ref() {
                if predicate(value) {
                    return Ok(value.clone());
                }
            }
            let (tx, rx) = oneshot::channel();
            cell.waiters.retain(|w| !w.tx.is_closed());
            cell.waiters.push(Waiter { predicate, tx });
            rx
        };

        let received = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline.at, rx).await {
                Ok(received) => received,
                Err(_) => return Err(deadline.expired()),
            },
            None => rx.await,
        };
        received.unwrap_or_else(|_| Err(Error::closed("waitable dropped while waiting")))
    }
}

impl<T: fmt::Debug> fmt::Debug for Waitable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cell = self.shared.cell.lock();
        f.debug_struct("Waitable")
            .field("value", &cell.value)
            .field("version", &cell.version)
            .field("phase", &cell.phase)
            .field("waiters", &cell.waiters.len())
            .field("listeners", &cell.listeners.len())
            .finish()
    }
}

/// Read, wait and subscribe view of a `Waitable`
///
/// Handed out by owners that must keep writes to themselves, such as the
/// state and value cells of a `Completable`.
pub struct WaitableNotify<T> {
    inner: Waitable<T>,
}

impl<T> Clone for WaitableNotify<T> {
    fn clone(&self) -> Self {
        WaitableNotify {
            inner: self.inner.clone(),
        }
    }
}

impl<T> WaitableNotify<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Current value; `IllegalState` when empty
    pub fn get(&self) -> Result<T> {
        self.inner.get()
    }

    /// Current value if present and `predicate` holds
    pub fn get_if<P>(&self, predicate: P) -> Option<T>
    where
        P: FnOnce(&T) -> bool,
    {
        self.inner.get_if(predicate)
    }

    /// See [`Waitable::get_when`]
    pub async fn get_when<P>(&self, predicate: P, timeout: Option<Duration>) -> Result<T>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.inner.get_when(predicate, timeout).await
    }

    /// See [`Waitable::supply_when`]
    pub async fn supply_when<P, F, R>(
        &self,
        predicate: P,
        supplier: F,
        timeout: Option<Duration>,
    ) -> Result<R>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
        F: FnOnce(&T) -> R,
    {
        self.inner.supply_when(predicate, supplier, timeout).await
    }

    /// See [`Waitable::notify_while`]
    pub fn notify_while<P, L>(&self, predicate: P, listener: L) -> CloseGuard
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
        L: FnMut(&T) + Send + 'static,
    {
        self.inner.notify_while(predicate, listener)
    }

    /// Check if the underlying cell has been shut down
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}
