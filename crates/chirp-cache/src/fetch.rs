use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use futures::channel::oneshot;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

use crate::FetchError;

/// The channel on which all concurrent callers for one key await the outcome
/// of the single in-flight fetch.
type FetchChannel<V> = Shared<oneshot::Receiver<Result<V, FetchError>>>;

/// The state of one key known to the cache.
enum Entry<V> {
    /// A fetch for this key has started and not yet resolved.
    InProgress(FetchChannel<V>),
    /// The fetch for this key completed successfully.
    Ready(V),
}

/// The driver performing the actual fetches on behalf of a [`FetchCache`].
///
/// The driver decides what a key and a value are, how a key is validated, and
/// how a value is retrieved. The cache never inspects values.
pub trait FetchDriver: Send + Sync + 'static {
    /// The key identifying a cacheable resource.
    type Key: Ord + Clone + Send + Sync + 'static;
    /// The fetched result. `Clone` because one result is fanned out to all
    /// concurrent callers.
    type Value: Clone + Send + Sync + 'static;

    /// Rejects keys that can never be fetched.
    ///
    /// This runs synchronously before the cache is consulted, so invalid keys
    /// neither trigger a fetch nor occupy a cache entry.
    fn validate(&self, _key: &Self::Key) -> Result<(), FetchError> {
        Ok(())
    }

    /// Fetches the value for `key`.
    ///
    /// This is invoked at most once per key while the result is cached, and
    /// again after a previous fetch for the key failed.
    fn fetch(&self, key: Self::Key) -> BoxFuture<'static, Result<Self::Value, FetchError>>;
}

/// An in-memory cache that deduplicates concurrent fetches per key.
///
/// Looking up a key that is already cached returns the stored value. Looking
/// up a key with a fetch in flight attaches to that fetch. Only a lookup of an
/// unknown key invokes the [`FetchDriver`], and the check-then-insert happens
/// under one lock so two concurrent first callers can never both trigger it.
///
/// Successful results are kept indefinitely; there is no expiry and no size
/// bound. A failed fetch propagates its error to all current callers and
/// removes the entry, so the next lookup retries.
pub struct FetchCache<D: FetchDriver> {
    driver: Arc<D>,
    entries: Arc<Mutex<BTreeMap<D::Key, Entry<D::Value>>>>,
}

impl<D: FetchDriver> Clone for FetchCache<D> {
    fn clone(&self) -> Self {
        // https://github.com/rust-lang/rust/issues/26925
        FetchCache {
            driver: Arc::clone(&self.driver),
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<D: FetchDriver> fmt::Debug for FetchCache<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchCache")
            .field("entries", &self.entries.lock().len())
            .finish()
    }
}

impl<D: FetchDriver> FetchCache<D> {
    /// Creates a cache that fetches through the given driver.
    pub fn new(driver: D) -> Self {
        FetchCache {
            driver: Arc::new(driver),
            entries: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Returns the value for `key`, fetching it if necessary.
    ///
    /// Concurrent calls for the same key are collapsed into a single
    /// invocation of [`FetchDriver::fetch`], and all of them observe the same
    /// outcome. Calls for different keys never wait on each other; the fetch
    /// itself runs outside the table lock.
    ///
    /// Cancelling a caller that is awaiting an in-flight fetch does not
    /// cancel the fetch: it still completes and settles the cache entry for
    /// everyone else.
    pub async fn get(&self, key: D::Key) -> Result<D::Value, FetchError> {
        self.driver.validate(&key)?;

        let channel = {
            let mut entries = self.entries.lock();
            match entries.get(&key) {
                Some(Entry::Ready(value)) => return Ok(value.clone()),
                Some(Entry::InProgress(channel)) => channel.clone(),
                None => {
                    let channel = self.spawn_fetch(key.clone());
                    entries.insert(key, Entry::InProgress(channel.clone()));
                    channel
                }
            }
        };

        match channel.await {
            Ok(result) => result,
            Err(oneshot::Canceled) => Err(FetchError::Canceled),
        }
    }

    /// Spawns the driver's fetch as a separate task and returns the channel
    /// on which its outcome will be delivered.
    ///
    /// This is *not* `async` on purpose: the fetch is spawned eagerly so it
    /// keeps running even if every caller awaiting it goes away. The spawned
    /// task settles the cache entry before resolving the channel, so callers
    /// either attach to a live channel or find the settled entry.
    fn spawn_fetch(&self, key: D::Key) -> FetchChannel<D::Value> {
        let (sender, receiver) = oneshot::channel();

        let driver = Arc::clone(&self.driver);
        let entries = Arc::clone(&self.entries);
        tokio::spawn(async move {
            let result = driver.fetch(key.clone()).await;

            {
                let mut entries = entries.lock();
                match &result {
                    Ok(value) => {
                        entries.insert(key, Entry::Ready(value.clone()));
                    }
                    Err(error) => {
                        tracing::debug!("fetch failed, evicting entry: {error}");
                        entries.remove(&key);
                    }
                }
            }

            sender.send(result).ok();
        });

        receiver.shared()
    }

    /// The number of keys currently known to the cache, in-flight fetches
    /// included.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
