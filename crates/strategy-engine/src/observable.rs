//! Observable cells with explicit subscriptions.
//!
//! A cell holds a value and a list of subscribers. Every `set` stores the new
//! value and then runs each subscriber synchronously on the calling thread, with
//! no value lock held, so a subscriber may freely read or write other cells.
//! Writes to one cell are serialized together with their notifications, and a
//! notification superseded by a newer write of the same cell stops early, so
//! the last value every subscriber sees is the value the cell holds.
//! Subscriptions are RAII guards: dropping one removes the subscriber.

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Cell<T> {
    value: RwLock<T>,
    version: AtomicU64,
    turn: ReentrantMutex<()>,
    subscribers: Mutex<Vec<(u64, Callback<T>)>>,
    next_id: AtomicU64,
}

/// Shared observable value
pub struct Observable<T> {
    cell: Arc<Cell<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> Observable<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(value: T) -> Self {
        Self {
            cell: Arc::new(Cell {
                value: RwLock::new(value),
                version: AtomicU64::new(0),
                turn: ReentrantMutex::new(()),
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Clone of the current value
    pub fn get(&self) -> T {
        self.cell.value.read().clone()
    }

    /// Runs `f` against the current value without cloning it.
    ///
    /// `f` must not write to this same cell.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.cell.value.read())
    }

    /// Stores `value` and notifies every subscriber
    pub fn set(&self, value: T) {
        self.update(move |current| *current = value);
    }

    /// Mutates the value in place and notifies every subscriber
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let _turn = self.cell.turn.lock();
        let (snapshot, version) = {
            let mut guard = self.cell.value.write();
            f(&mut guard);
            let version = self.cell.version.fetch_add(1, Ordering::SeqCst) + 1;
            (guard.clone(), version)
        };
        self.notify(&snapshot, version);
    }

    fn notify(&self, value: &T, version: u64) {
        let subscribers: Vec<Callback<T>> = self
            .cell
            .subscribers
            .lock()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in subscribers {
            // a subscriber wrote this cell again; that write already notified everyone
            if self.cell.version.load(Ordering::SeqCst) != version {
                break;
            }
            callback(value);
        }
    }

    /// Runs `f` after every future change
    pub fn subscribe<F>(&self, f: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.cell.next_id.fetch_add(1, Ordering::Relaxed);
        self.cell.subscribers.lock().push((id, Arc::new(f)));

        let cell = Arc::downgrade(&self.cell);
        Subscription::new(move || {
            if let Some(cell) = cell.upgrade() {
                cell.subscribers.lock().retain(|(sid, _)| *sid != id);
            }
        })
    }

    /// Runs `f` with the current value right away, then after every change
    pub fn watch<F>(&self, f: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let on_change = Arc::clone(&f);
        let _turn = self.cell.turn.lock();
        let subscription = self.subscribe(move |value| on_change(value));
        let current = self.get();
        f(&current);
        subscription
    }

    pub fn subscriber_count(&self) -> usize {
        self.cell.subscribers.lock().len()
    }

    /// Non-owning handle to the same cell
    pub fn downgrade(&self) -> WeakObservable<T> {
        WeakObservable {
            cell: Arc::downgrade(&self.cell),
        }
    }
}

impl<T> Default for Observable<T>
where
    T: Default + Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Observable::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("value", &*self.cell.value.read())
            .field("subscribers", &self.cell.subscribers.lock().len())
            .finish()
    }
}

/// Weak counterpart of [`Observable`]
pub struct WeakObservable<T> {
    cell: Weak<Cell<T>>,
}

impl<T> WeakObservable<T> {
    pub fn upgrade(&self) -> Option<Observable<T>> {
        self.cell.upgrade().map(|cell| Observable { cell })
    }
}

impl<T> Clone for WeakObservable<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Weak::clone(&self.cell),
        }
    }
}

impl<T> fmt::Debug for WeakObservable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakObservable").finish_non_exhaustive()
    }
}

/// Guard that removes its subscriber when dropped
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Subscriptions torn down together
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Unsubscribes everything
    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }
}

impl Extend<Subscription> for SubscriptionSet {
    fn extend<I: IntoIterator<Item = Subscription>>(&mut self, iter: I) {
        self.subscriptions.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_subscribe_sees_every_set() {
        let cell = Observable::new(0u32);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = cell.subscribe(move |v| sink.lock().push(*v));

        cell.set(1);
        cell.set(1);
        cell.update(|v| *v += 1);

        assert_eq!(*seen.lock(), vec![1, 1, 2]);
        assert_eq!(cell.get(), 2);
    }

    #[test]
    fn test_watch_fires_immediately() {
        let cell = Observable::new("mainnet".to_string());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = cell.watch(move |v: &String| sink.lock().push(v.clone()));

        cell.set("polygon".to_string());
        assert_eq!(*seen.lock(), vec!["mainnet", "polygon"]);
    }

    #[test]
    fn test_dropping_subscription_unsubscribes() {
        let cell = Observable::new(0u8);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let sub = cell.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        cell.set(1);
        drop(sub);
        cell.set(2);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cell.subscriber_count(), 0);
    }

    #[test]
    fn test_subscription_set_tears_down_together() {
        let a = Observable::new(0u8);
        let b = Observable::new(0u8);
        let mut set = SubscriptionSet::new();
        set.push(a.subscribe(|_| {}));
        set.push(b.subscribe(|_| {}));
        assert_eq!(a.subscriber_count() + b.subscriber_count(), 2);

        set.clear();
        assert_eq!(a.subscriber_count() + b.subscriber_count(), 0);
    }

    #[test]
    fn test_subscriber_may_write_other_cells() {
        let source = Observable::new(1u32);
        let derived = Observable::new(0u32);
        let target = derived.clone();
        let reader = source.clone();
        let _sub = source.subscribe(move |v| target.set(*v * 10 + reader.get()));

        source.set(4);
        assert_eq!(derived.get(), 44);
    }

    #[test]
    fn test_nested_write_is_the_last_value_seen() {
        let cell = Observable::new(0u32);
        let clamp = cell.downgrade();
        let _clamp = cell.subscribe(move |v| {
            if *v > 10 {
                if let Some(cell) = clamp.upgrade() {
                    cell.set(10);
                }
            }
        });
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _record = cell.subscribe(move |v| sink.lock().push(*v));

        cell.set(15);

        assert_eq!(cell.get(), 10);
        assert_eq!(*seen.lock(), vec![10]);
    }

    #[test]
    fn test_concurrent_writers_leave_subscribers_on_final_value() {
        let cell = Observable::new(0u32);
        let last = Arc::new(Mutex::new(0u32));
        let sink = last.clone();
        let _sub = cell.subscribe(move |v| {
            std::thread::yield_now();
            *sink.lock() = *v;
        });

        let writers: Vec<_> = (0..4u32)
            .map(|writer| {
                let cell = cell.clone();
                std::thread::spawn(move || {
                    for i in 0..500u32 {
                        cell.set(writer * 1_000 + i);
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        assert_eq!(*last.lock(), cell.get());
    }

    #[test]
    fn test_weak_handle_does_not_keep_cell_alive() {
        let cell = Observable::new(5u8);
        let weak = cell.downgrade();
        assert_eq!(weak.upgrade().map(|c| c.get()), Some(5));
        drop(cell);
        assert!(weak.upgrade().is_none());
    }
}
