use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OnceCell;

/// A per-connection memo table with single-flight population.
///
/// Each key owns a [`OnceCell`]: concurrent callers for the same key wait on
/// the one in-flight initializer instead of racing. A failed initializer
/// leaves the cell empty so the next caller retries. Removing a key while it
/// is being populated detaches the cell; the populating caller still gets
/// its value and the next caller starts over.
#[derive(Debug)]
pub(crate) struct KeyedCache<K, V> {
    inner: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> Default for KeyedCache<K, V> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> KeyedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Arc<OnceCell<V>>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cell(&self, key: &K) -> Arc<OnceCell<V>> {
        self.lock().entry(key.clone()).or_default().clone()
    }

    /// Get the cached value or populate it with `init`.
    pub(crate) async fn get_or_try_init<E, F, Fut>(&self, key: &K, init: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let cell = self.cell(key);
        cell.get_or_try_init(init).await.cloned()
    }

    pub(crate) fn get(&self, key: &K) -> Option<V> {
        self.lock().get(key).and_then(|cell| cell.get().cloned())
    }

    pub(crate) fn remove(&self, key: &K) {
        self.lock().remove(key);
    }

    pub(crate) fn retain<F>(&self, mut keep: F)
    where
        F: FnMut(&K) -> bool,
    {
        self.lock().retain(|k, _| keep(k));
    }

    pub(crate) fn clear(&self) {
        self.lock().clear();
    }

    /// Number of populated entries.
    pub(crate) fn len(&self) -> usize {
        self.lock().values().filter(|c| c.initialized()).count()
    }
}
