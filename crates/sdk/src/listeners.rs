use std::{
    any::Any,
    collections::HashMap,
    fmt::Debug,
    hash::Hash,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use parking_lot::Mutex;
use tracing::error;

/// A registered callback. Identity (for [`ListenerRegistry::off`]) is the `Arc` pointer.
pub type Listener<A> = Arc<dyn Fn(&A) + Send + Sync>;

struct Entry<A> {
    listener: Listener<A>,
    /// Present for one-shot registrations; flipped by the first emission that claims it
    fired: Option<Arc<AtomicBool>>,
}

impl<A> Clone for Entry<A> {
    fn clone(&self) -> Self {
        Self {
            listener: Arc::clone(&self.listener),
            fired: self.fired.clone(),
        }
    }
}

/// Ordered listener lists keyed by event kind
///
/// Listeners run synchronously, in registration order, on the thread calling
/// [`emit`](Self::emit). The internal lock is released while listeners run,
/// so a listener may register, remove or emit on the same registry.
///
/// # Example
///
/// ```ignore
/// let registry = ListenerRegistry::<&str, u32>::new();
/// registry.on("tick", Arc::new(|n: &u32| println!("tick {n}")));
/// registry.once("tick", Arc::new(|_: &u32| println!("first tick only")));
/// registry.emit(&"tick", &1);
/// ```
pub struct ListenerRegistry<K, A> {
    events: Mutex<HashMap<K, Vec<Entry<A>>>>,
}

impl<K, A> Default for ListenerRegistry<K, A> {
    fn default() -> Self {
        Self {
            events: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, A> ListenerRegistry<K, A>
where
    K: Eq + Hash + Clone + Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener. Registering the same listener twice yields two calls per emission.
    pub fn on(&self, event: K, listener: Listener<A>) -> &Self {
        self.push(event, Entry {
            listener,
            fired: None,
        })
    }

    /// Append a listener that is removed before its first invocation.
    pub fn once(&self, event: K, listener: Listener<A>) -> &Self {
        self.push(event, Entry {
            listener,
            fired: Some(Arc::new(AtomicBool::new(false))),
        })
    }

    /// Remove every registration of `listener` for `event`. No-op if absent.
    pub fn off(&self, event: &K, listener: &Listener<A>) -> &Self {
        let mut events = self.events.lock();
        if let Some(entries) = events.get_mut(event) {
            entries.retain(|entry| !Arc::ptr_eq(&entry.listener, listener));
            if entries.is_empty() {
                events.remove(event);
            }
        }
        self
    }

    /// Clear the listeners of one event kind, or of every kind when `event` is `None`.
    pub fn remove_all_listeners(&self, event: Option<&K>) -> &Self {
        let mut events = self.events.lock();
        match event {
            Some(event) => {
                events.remove(event);
            }
            None => events.clear(),
        }
        self
    }

    /// Invoke the listeners of `event` in registration order.
    ///
    /// A panicking listener is logged and skipped; the remaining listeners still run.
    /// Returns whether any listener was registered.
    pub fn emit(&self, event: &K, args: &A) -> bool {
        let snapshot = match self.events.lock().get(event) {
            Some(entries) => entries.clone(),
            None => return false,
        };

        for entry in snapshot {
            if let Some(fired) = &entry.fired {
                if fired.swap(true, Ordering::SeqCst) {
                    continue;
                }
                self.remove_once(event, fired);
            }

            let listener = &entry.listener;
            if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| listener(args))) {
                error!(
                    event = ?event,
                    error = %panic_message(&panic),
                    "Listener panicked"
                );
            }
        }

        true
    }

    pub fn listener_count(&self, event: &K) -> usize {
        self.events.lock().get(event).map_or(0, Vec::len)
    }

    /// Snapshot of the listeners currently registered for `event`
    pub fn listeners(&self, event: &K) -> Vec<Listener<A>> {
        self.events
            .lock()
            .get(event)
            .map(|entries| entries.iter().map(|e| Arc::clone(&e.listener)).collect())
            .unwrap_or_default()
    }

    fn push(&self, event: K, entry: Entry<A>) -> &Self {
        self.events.lock().entry(event).or_default().push(entry);
        self
    }

    fn remove_once(&self, event: &K, fired: &Arc<AtomicBool>) {
        let mut events = self.events.lock();
        if let Some(entries) = events.get_mut(event) {
            entries.retain(|entry| {
                !entry
                    .fired
                    .as_ref()
                    .is_some_and(|flag| Arc::ptr_eq(flag, fired))
            });
            if entries.is_empty() {
                events.remove(event);
            }
        }
    }
}

pub(crate) fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
