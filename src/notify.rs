// Change notification between record producers and the recompute layer.
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::SystemTime;

/// Payload-free "something changed" events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeSignal {
    /// A collaborator in this process created a record or updated a status.
    DataChanged,
    /// The backing store was mutated by another process.
    StorageChanged,
}

pub type Listener = Arc<dyn Fn(ChangeSignal) + Send + Sync>;

pub trait ChangeNotifier {
    /// Register `listener`; it stays registered until the returned
    /// `Subscription` is dropped.
    fn subscribe(&self, listener: Listener) -> Subscription;
    fn publish(&self, signal: ChangeSignal);
}

/// Unregisters its listener on drop.
#[must_use = "dropping a Subscription immediately unsubscribes"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Subscription {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: BTreeMap<u64, Listener>,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Synchronous in-process notifier. Clones share the same listener set.
#[derive(Clone, Default)]
pub struct LocalNotifier {
    registry: Arc<Mutex<Registry>>,
}

impl LocalNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.registry).listeners.len()
    }
}

impl ChangeNotifier for LocalNotifier {
    fn subscribe(&self, listener: Listener) -> Subscription {
        let id = {
            let mut reg = lock(&self.registry);
            let id = reg.next_id;
            reg.next_id += 1;
            reg.listeners.insert(id, listener);
            id
        };
        let registry: Weak<Mutex<Registry>> = Arc::downgrade(&self.registry);
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                lock(&registry).listeners.remove(&id);
            }
        })
    }

    fn publish(&self, signal: ChangeSignal) {
        // Listeners run outside the lock so they may publish or subscribe.
        let listeners: Vec<Listener> = lock(&self.registry).listeners.values().cloned().collect();
        tracing::debug!(?signal, listeners = listeners.len(), "publishing change signal");
        for listener in listeners {
            listener(signal);
        }
    }
}

impl std::fmt::Debug for LocalNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalNotifier")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Modification time, length and content hash. The hash catches same-length
/// rewrites that land within the filesystem's mtime resolution.
type Stamp = Option<(SystemTime, u64, u64)>;

fn stamp(path: &Path) -> Stamp {
    let meta = std::fs::metadata(path).ok()?;
    let bytes = std::fs::read(path).ok()?;
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    Some((meta.modified().ok()?, meta.len(), hasher.finish()))
}

/// Detects writes made by other processes by polling file stamps, and
/// turns them into `StorageChanged` signals.
#[derive(Debug)]
pub struct StorageWatcher {
    paths: Vec<PathBuf>,
    last: Vec<Stamp>,
}

impl StorageWatcher {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        let last = paths.iter().map(|p| stamp(p)).collect();
        StorageWatcher { paths, last }
    }

    /// Re-read the stamps and publish once if any file changed since the
    /// previous poll. Returns whether a signal was sent.
    pub fn poll<N: ChangeNotifier + ?Sized>(&mut self, notifier: &N) -> bool {
        let current: Vec<Stamp> = self.paths.iter().map(|p| stamp(p)).collect();
        if current == self.last {
            return false;
        }
        self.last = current;
        notifier.publish(ChangeSignal::StorageChanged);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter(notifier: &LocalNotifier) -> (Arc<AtomicUsize>, Subscription) {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        let sub = notifier.subscribe(Arc::new(move |_: ChangeSignal| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        (hits, sub)
    }

    #[test]
    fn publish_reaches_every_listener() {
        let notifier = LocalNotifier::new();
        let (a, _sa) = counter(&notifier);
        let (b, _sb) = counter(&notifier);
        notifier.publish(ChangeSignal::DataChanged);
        notifier.publish(ChangeSignal::StorageChanged);
        assert_eq!(a.load(Ordering::SeqCst), 2);
        assert_eq!(b.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dropping_subscription_unregisters() {
        let notifier = LocalNotifier::new();
        let (hits, sub) = counter(&notifier);
        assert_eq!(notifier.listener_count(), 1);
        drop(sub);
        assert_eq!(notifier.listener_count(), 0);
        notifier.publish(ChangeSignal::DataChanged);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn listeners_may_publish_reentrantly() {
        let notifier = LocalNotifier::new();
        let inner = notifier.clone();
        let _echo = notifier.subscribe(Arc::new(move |signal: ChangeSignal| {
            if signal == ChangeSignal::StorageChanged {
                inner.publish(ChangeSignal::DataChanged);
            }
        }));
        let (hits, _sub) = counter(&notifier);
        notifier.publish(ChangeSignal::StorageChanged);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn watcher_publishes_on_file_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("donations.json");
        let notifier = LocalNotifier::new();
        let (hits, _sub) = counter(&notifier);
        let mut watcher = StorageWatcher::new(vec![path.clone()]);

        assert!(!watcher.poll(&notifier));
        std::fs::write(&path, "[]").unwrap();
        assert!(watcher.poll(&notifier));
        assert!(!watcher.poll(&notifier));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn watcher_sees_same_length_rewrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requests.json");
        std::fs::write(&path, r#"[{"status":"Pending"}]"#).unwrap();
        let notifier = LocalNotifier::new();
        let mut watcher = StorageWatcher::new(vec![path.clone()]);

        // Same length, and likely the same mtime tick.
        std::fs::write(&path, r#"[{"status":"Picked!"}]"#).unwrap();
        assert!(watcher.poll(&notifier));
    }
}
