//! Single-threaded listener lists with scoped subscriptions.
//!
//! A [`Signal`] owns an ordered list of callbacks. Connecting hands back a
//! [`Subscription`]; dropping it removes the callback again, so a binding can
//! be torn down by dropping the value that holds its subscriptions.

use smallvec::SmallVec;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

type Callback<A> = Rc<dyn Fn(&A)>;

struct Slot<A> {
    id: u64,
    once: bool,
    alive: Rc<Cell<bool>>,
    callback: Callback<A>,
}

struct Slots<A> {
    next_id: u64,
    entries: SmallVec<[Slot<A>; 4]>,
}

pub struct Signal<A> {
    slots: Rc<RefCell<Slots<A>>>,
}

impl<A> Clone for Signal<A> {
    fn clone(&self) -> Self {
        Self { slots: Rc::clone(&self.slots) }
    }
}

impl<A: 'static> Default for Signal<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for Signal<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal").field("listeners", &self.slots.borrow().entries.len()).finish()
    }
}

impl<A: 'static> Signal<A> {
    pub fn new() -> Self {
        Self { slots: Rc::new(RefCell::new(Slots { next_id: 0, entries: SmallVec::new() })) }
    }

    pub fn connect<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&A) + 'static,
    {
        self.attach(Rc::new(callback), false)
    }

    /// Like [`Signal::connect`], but the callback is dropped after its first call.
    pub fn connect_once<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&A) + 'static,
    {
        self.attach(Rc::new(callback), true)
    }

    fn attach(&self, callback: Callback<A>, once: bool) -> Subscription {
        let alive = Rc::new(Cell::new(true));
        let id = {
            let mut slots = self.slots.borrow_mut();
            let id = slots.next_id;
            slots.next_id += 1;
            slots.entries.push(Slot { id, once, alive: Rc::clone(&alive), callback });
            id
        };
        let weak: Weak<RefCell<Slots<A>>> = Rc::downgrade(&self.slots);
        let flag = Rc::clone(&alive);
        Subscription {
            alive,
            revoke: Some(Box::new(move || {
                flag.set(false);
                if let Some(slots) = weak.upgrade() {
                    slots.borrow_mut().entries.retain(|slot| slot.id != id);
                }
            })),
        }
    }

    /// Calls every connected listener in connection order.
    ///
    /// No borrow is held while callbacks run, so a listener may connect,
    /// disconnect or emit again. A listener disconnected by an earlier one in
    /// the same emission is skipped.
    pub fn emit(&self, args: &A) {
        let pending: SmallVec<[(bool, Rc<Cell<bool>>, Callback<A>); 4]> = {
            let mut slots = self.slots.borrow_mut();
            let pending = slots
                .entries
                .iter()
                .map(|slot| (slot.once, Rc::clone(&slot.alive), Rc::clone(&slot.callback)))
                .collect();
            slots.entries.retain(|slot| !slot.once);
            pending
        };
        for (once, alive, callback) in pending {
            if !alive.get() {
                continue;
            }
            if once {
                alive.set(false);
            }
            callback(args);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.slots.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listener_count() == 0
    }
}

#[must_use = "dropping a Subscription disconnects its listener"]
pub struct Subscription {
    alive: Rc<Cell<bool>>,
    revoke: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// False once the listener was disconnected or, for one-shot listeners, has fired.
    pub fn is_connected(&self) -> bool {
        self.alive.get()
    }

    pub fn disconnect(mut self) {
        self.revoke_now();
    }

    /// Runs `cleanup` right after the listener is removed.
    pub fn on_disconnect<F>(mut self, cleanup: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        let revoke = self.revoke.take();
        self.revoke = Some(Box::new(move || {
            if let Some(revoke) = revoke {
                revoke();
            }
            cleanup();
        }));
        self
    }

    fn revoke_now(&mut self) {
        if let Some(revoke) = self.revoke.take() {
            revoke();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.revoke_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("connected", &self.is_connected()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Rc<RefCell<Vec<u32>>>, impl Fn(u32) -> Box<dyn Fn(&u32)>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let make = move |tag: u32| -> Box<dyn Fn(&u32)> {
            let sink = Rc::clone(&sink);
            Box::new(move |value: &u32| sink.borrow_mut().push(tag * 100 + *value))
        };
        (log, make)
    }

    #[test]
    fn listeners_fire_in_connection_order() {
        let signal = Signal::<u32>::new();
        let (log, make) = recorder();
        let _a = signal.connect(make(1));
        let _b = signal.connect(make(2));
        signal.emit(&7);
        assert_eq!(*log.borrow(), vec![107, 207]);
    }

    #[test]
    fn dropping_subscription_disconnects() {
        let signal = Signal::<u32>::new();
        let (log, make) = recorder();
        let sub = signal.connect(make(1));
        assert_eq!(signal.listener_count(), 1);
        drop(sub);
        assert!(signal.is_empty());
        signal.emit(&1);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn once_listener_fires_a_single_time() {
        let signal = Signal::<u32>::new();
        let (log, make) = recorder();
        let sub = signal.connect_once(make(3));
        signal.emit(&1);
        signal.emit(&2);
        assert_eq!(*log.borrow(), vec![301]);
        assert!(!sub.is_connected());
        drop(sub);
    }

    #[test]
    fn disconnect_during_emit_skips_later_listener() {
        let signal = Signal::<u32>::new();
        let (log, make) = recorder();
        let victim: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let victim_handle = Rc::clone(&victim);
        let _killer = signal.connect(move |_| {
            victim_handle.borrow_mut().take();
        });
        *victim.borrow_mut() = Some(signal.connect(make(9)));
        signal.emit(&1);
        assert!(log.borrow().is_empty(), "revoked listener must not run");
    }

    #[test]
    fn listener_may_connect_while_emitting() {
        let signal = Signal::<u32>::new();
        let held: Rc<RefCell<Vec<Subscription>>> = Rc::new(RefCell::new(Vec::new()));
        let inner_signal = signal.clone();
        let held_inner = Rc::clone(&held);
        let _outer = signal.connect(move |_| {
            held_inner.borrow_mut().push(inner_signal.connect(|_| {}));
        });
        signal.emit(&0);
        assert_eq!(signal.listener_count(), 2);
    }

    #[test]
    fn disconnect_cleanup_runs_after_removal() {
        let signal = Signal::<u32>::new();
        let observed = Rc::new(Cell::new(None));
        let watched = signal.clone();
        let seen = Rc::clone(&observed);
        let sub = signal
            .connect(|_| {})
            .on_disconnect(move || seen.set(Some(watched.listener_count())));
        assert_eq!(observed.get(), None);
        drop(sub);
        assert_eq!(observed.get(), Some(0));
    }

    #[test]
    fn revoking_twice_is_harmless() {
        let signal = Signal::<u32>::new();
        let sub = signal.connect(|_| {});
        let signal_gone = signal.clone();
        drop(signal);
        drop(signal_gone);
        sub.disconnect();
    }
}
