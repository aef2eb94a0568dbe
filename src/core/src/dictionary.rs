use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use accel_wire::encode_to_vec;
use futures::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;
use tracing::debug;

/// Failure from a caller-supplied dictionary loader.
///
/// Cloneable so one in-flight load can hand its outcome to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("dictionary load: {0}")]
pub struct DictionaryError(pub String);

type SharedLoad<V> = Shared<BoxFuture<'static, Result<V, DictionaryError>>>;

struct Slot<V> {
    value: V,
    last_used: u64,
}

struct CacheState<K, V> {
    entries: HashMap<K, Slot<V>>,
    in_flight: HashMap<K, SharedLoad<V>>,
    tick: u64,
}

/// Bounded cache with per-key in-flight load deduplication.
///
/// A miss installs a shared pending cell keyed by the missing entry, so
/// concurrent lookups for the same key await one load instead of issuing
/// duplicates; unrelated keys never contend beyond the map lock itself.
/// Failed loads are not cached. Eviction is least-recently-used.
pub struct SingleFlightCache<K, V> {
    capacity: usize,
    state: Mutex<CacheState<K, V>>,
}

impl<K, V> SingleFlightCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                in_flight: HashMap::new(),
                tick: 0,
            }),
        }
    }

    /// Return the cached value for `key`, or run `load` to produce it.
    ///
    /// `load` is invoked at most once per missing key across concurrent
    /// callers; later callers share the in-flight result.
    pub async fn get_or_load<F>(&self, key: K, load: F) -> Result<V, DictionaryError>
    where
        F: FnOnce() -> BoxFuture<'static, Result<V, DictionaryError>>,
    {
        let pending = {
            let mut state = self.state.lock().unwrap();
            state.tick += 1;
            let tick = state.tick;
            if let Some(slot) = state.entries.get_mut(&key) {
                slot.last_used = tick;
                return Ok(slot.value.clone());
            }
            if let Some(pending) = state.in_flight.get(&key) {
                pending.clone()
            } else {
                debug!(entries = state.entries.len(), "cache miss, scheduling load");
                let fut = load().shared();
                state.in_flight.insert(key.clone(), fut.clone());
                fut
            }
        };

        let result = pending.await;

        let mut state = self.state.lock().unwrap();
        state.in_flight.remove(&key);
        let value = result?;
        state.tick += 1;
        let tick = state.tick;
        state.entries.insert(
            key,
            Slot {
                value: value.clone(),
                last_used: tick,
            },
        );
        if state.entries.len() > self.capacity {
            evict_lru(&mut state);
        }
        Ok(value)
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` is resident, without touching recency.
    pub fn contains(&self, key: &K) -> bool {
        self.state.lock().unwrap().entries.contains_key(key)
    }
}

fn evict_lru<K: Eq + Hash + Clone, V>(state: &mut CacheState<K, V>) {
    let oldest = state
        .entries
        .iter()
        .min_by_key(|(_, slot)| slot.last_used)
        .map(|(k, _)| k.clone());
    if let Some(key) = oldest {
        state.entries.remove(&key);
    }
}

/// Loader for the id→names direction: asks the cluster which attribute
/// names a dictionary identifier stands for.
pub type NamesLoader =
    Arc<dyn Fn(i64) -> BoxFuture<'static, Result<Vec<String>, DictionaryError>> + Send + Sync>;

/// Loader for the names→id direction: registers an attribute name list
/// and learns its dictionary identifier.
pub type IdLoader =
    Arc<dyn Fn(Vec<String>) -> BoxFuture<'static, Result<i64, DictionaryError>> + Send + Sync>;

/// Session-scoped mapping between attribute name lists and the compact
/// numeric identifiers the wire protocol substitutes for them.
///
/// Both directions cache through [`SingleFlightCache`]; the miss path
/// calls out to the cluster via the supplied loaders. The core only
/// queries this mapping, it never evicts or repopulates it directly.
pub struct AttributeDictionary {
    names_by_id: SingleFlightCache<i64, Arc<Vec<String>>>,
    ids_by_key: SingleFlightCache<Vec<u8>, i64>,
    names_loader: NamesLoader,
    id_loader: IdLoader,
}

impl AttributeDictionary {
    pub fn new(capacity: usize, names_loader: NamesLoader, id_loader: IdLoader) -> Self {
        Self {
            names_by_id: SingleFlightCache::new(capacity),
            ids_by_key: SingleFlightCache::new(capacity),
            names_loader,
            id_loader,
        }
    }

    /// Resolve a dictionary identifier to its ordered attribute names.
    pub async fn names_for_id(&self, id: i64) -> Result<Arc<Vec<String>>, DictionaryError> {
        let loader = self.names_loader.clone();
        self.names_by_id
            .get_or_load(id, move || {
                async move { loader(id).await.map(Arc::new) }.boxed()
            })
            .await
    }

    /// Resolve an ordered attribute name list to its dictionary identifier.
    pub async fn id_for_names(&self, names: &[String]) -> Result<i64, DictionaryError> {
        let key = canonical_key(names);
        let loader = self.id_loader.clone();
        let names = names.to_vec();
        self.ids_by_key
            .get_or_load(key, move || loader(names))
            .await
    }
}

/// Canonical lookup key for a name list: every name re-encoded through
/// the wire writer, so equal lists yield identical key bytes no matter
/// how the caller assembled them.
fn canonical_key(names: &[String]) -> Vec<u8> {
    encode_to_vec(|w| {
        for name in names {
            w.write_string(name);
        }
    })
}
