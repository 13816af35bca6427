//! Durable change listeners with reentrant coalescing
//!
//! A listener is offered `(version, value)` pairs after every change of the
//! cell it is registered on. Offers are delivered outside the cell lock, so
//! two rules keep delivery sane:
//!
//! 1. Only versions newer than the last delivered one are delivered. A slow
//!    writer whose offer arrives after a newer one is simply dropped, which
//!    keeps per-listener order equal to mutation order.
//! 2. While the callback runs, further offers (from the callback itself or
//!    from other threads) land in a single pending slot holding the newest
//!    value. The delivering thread drains that slot when the callback
//!    returns, so reentrant writes never recurse and never deadlock.

use crate::guard::GuardSlot;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

pub(crate) type ListenerPredicate<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;
pub(crate) type ListenerCallback<T> = Box<dyn FnMut(&T) + Send>;

struct Delivery<T> {
    notifying: bool,
    pending: Option<(u64, T)>,
    delivered: u64,
}

pub(crate) struct Listener<T> {
    id: u64,
    predicate: ListenerPredicate<T>,
    callback: Mutex<ListenerCallback<T>>,
    delivery: Mutex<Delivery<T>>,
    active: AtomicBool,
    guard: Mutex<Option<GuardSlot>>,
}

impl<T: Clone> Listener<T> {
    pub(crate) fn new(
        id: u64,
        predicate: ListenerPredicate<T>,
        callback: ListenerCallback<T>,
    ) -> Self {
        Listener {
            id,
            predicate,
            callback: Mutex::new(callback),
            delivery: Mutex::new(Delivery {
                notifying: false,
                pending: None,
                delivered: 0,
            }),
            active: AtomicBool::new(true),
            guard: Mutex::new(None),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Permanently silence this listener
    pub(crate) fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Link the subscriber's guard so `close` can release it
    pub(crate) fn attach(&self, slot: GuardSlot) {
        *self.guard.lock() = Some(slot);
    }

    /// Silence this listener and release the subscriber's guard
    pub(crate) fn close(&self) {
        self.deactivate();
        let slot = self.guard.lock().take();
        if let Some(slot) = slot {
            slot.release();
        }
    }

    /// Offer a changed value
    pub(crate) fn offer(&self, version: u64, value: T) {
        {
            let mut delivery = self.delivery.lock();
            if version <= delivery.delivered {
                return;
            }
            if delivery.notifying {
                let newer = match &delivery.pending {
                    Some((pending, _)) => version > *pending,
                    None => true,
                };
                if newer {
                    delivery.pending = Some((version, value));
                }
                return;
            }
            delivery.notifying = true;
        }

        let mut next = Some((version, value));
        while let Some((version, value)) = next.take() {
            let fresh = {
                let mut delivery = self.delivery.lock();
                if version > delivery.delivered {
                    delivery.delivered = version;
                    true
                } else {
                    false
                }
            };
            if fresh && self.is_active() && (self.predicate)(&value) {
                let mut callback = self.callback.lock();
                (*callback)(&value);
            }

            let mut delivery = self.delivery.lock();
            next = delivery.pending.take();
            if next.is_none() {
                delivery.notifying = false;
            }
        }
    }
}
