use super::Subscription;
use dashmap::DashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Fan-out registry for one hook stream.
///
/// Callbacks are cloned out of the registry before they run, so a callback may
/// release its own subscription (or any other) without deadlocking.
pub struct Dispatcher<T: 'static> {
    next_id: AtomicU64,
    subscribers: Arc<DashMap<u64, Callback<T>>>,
}

impl<T: 'static> Dispatcher<T> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            subscribers: Arc::new(DashMap::new()),
        }
    }

    pub fn subscribe(&self, label: &'static str, callback: Callback<T>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.insert(id, callback);

        let subscribers = Arc::clone(&self.subscribers);
        Subscription::new(label, move || {
            subscribers.remove(&id);
        })
    }

    pub fn dispatch(&self, event: &T) {
        let mut callbacks: Vec<(u64, Callback<T>)> = self
            .subscribers
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();
        callbacks.sort_by_key(|(id, _)| *id);

        for (_, callback) in callbacks {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl<T: 'static> Default for Dispatcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_dispatch_in_subscription_order() {
        let dispatcher = Dispatcher::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&seen);
        let _a = dispatcher.subscribe("a", Arc::new(move |v: &u32| first.lock().unwrap().push(("a", *v))));
        let second = Arc::clone(&seen);
        let _b = dispatcher.subscribe("b", Arc::new(move |v: &u32| second.lock().unwrap().push(("b", *v))));

        dispatcher.dispatch(&7);

        assert_eq!(*seen.lock().unwrap(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let dispatcher = Dispatcher::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let mut subscription =
            dispatcher.subscribe("a", Arc::new(move |v: &u32| sink.lock().unwrap().push(*v)));

        dispatcher.dispatch(&1);
        subscription.unsubscribe();
        dispatcher.dispatch(&2);

        assert_eq!(*seen.lock().unwrap(), vec![1]);
        assert!(dispatcher.is_empty());
    }

    #[test]
    fn test_callback_can_release_its_own_subscription() {
        let dispatcher = Arc::new(Dispatcher::<u32>::new());
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let inner = Arc::clone(&slot);
        let subscription = dispatcher.subscribe(
            "self-releasing",
            Arc::new(move |_: &u32| {
                if let Some(mut own) = inner.lock().unwrap().take() {
                    own.unsubscribe();
                }
            }),
        );
        *slot.lock().unwrap() = Some(subscription);

        dispatcher.dispatch(&1);
        assert_eq!(dispatcher.len(), 0);
    }
}
