//! Hot-swap publication of synonym maps to live filters.
//!
//! A [`PublishedSynonyms`] holds the map a factory currently hands out and
//! the set of filters reading from it. Each filter owns a [`MapSlot`]; the
//! registry only keeps slot references keyed by a generation-checked
//! [`ConsumerKey`], so it never keeps a filter alive. A filter leaves the
//! registry when its [`ConsumerHandle`] is dropped.
//!
//! ```text
//! publish(map) ──▶ current.store(map)
//!              └─▶ snapshot live slots ──▶ slot.store(map) for each
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::synonym::map::SynonymMap;

/// The map snapshot a single consumer reads from.
pub type MapSlot = Arc<ArcSwap<SynonymMap>>;

/// Identifies one registration. Stale keys never match a reused entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConsumerKey {
    index: usize,
    generation: u64,
}

#[derive(Debug)]
struct ArenaEntry {
    generation: u64,
    slot: Option<MapSlot>,
}

#[derive(Debug, Default)]
struct Arena {
    entries: Vec<ArenaEntry>,
    free: Vec<usize>,
    live: usize,
}

/// Generation-keyed arena of live consumer slots.
#[derive(Debug, Default)]
pub struct ConsumerRegistry {
    arena: Mutex<Arena>,
}

impl ConsumerRegistry {
    pub fn new() -> Self {
        ConsumerRegistry::default()
    }

    /// Register a slot.
    pub fn register(&self, slot: MapSlot) -> ConsumerKey {
        self.register_with(|| slot).0
    }

    /// Create and register a slot while holding the arena lock.
    pub fn register_with<F>(&self, make_slot: F) -> (ConsumerKey, MapSlot)
    where
        F: FnOnce() -> MapSlot,
    {
        let mut arena = self.arena.lock();
        let slot = make_slot();

        let key = match arena.free.pop() {
            Some(index) => {
                let entry = &mut arena.entries[index];
                entry.generation += 1;
                entry.slot = Some(Arc::clone(&slot));
                ConsumerKey {
                    index,
                    generation: entry.generation,
                }
            }
            None => {
                arena.entries.push(ArenaEntry {
                    generation: 0,
                    slot: Some(Arc::clone(&slot)),
                });
                ConsumerKey {
                    index: arena.entries.len() - 1,
                    generation: 0,
                }
            }
        };
        arena.live += 1;

        (key, slot)
    }

    /// Remove a registration. Returns `false` for an unknown or stale key.
    pub fn deregister(&self, key: ConsumerKey) -> bool {
        let mut arena = self.arena.lock();
        let Some(entry) = arena.entries.get_mut(key.index) else {
            return false;
        };
        if entry.generation != key.generation || entry.slot.is_none() {
            return false;
        }

        entry.slot = None;
        arena.free.push(key.index);
        arena.live -= 1;
        true
    }

    /// Snapshot of every live slot.
    pub fn live(&self) -> Vec<MapSlot> {
        self.arena
            .lock()
            .entries
            .iter()
            .filter_map(|entry| entry.slot.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.arena.lock().live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The map a factory currently serves, plus every filter reading from it.
pub struct PublishedSynonyms {
    current: ArcSwap<SynonymMap>,
    consumers: ConsumerRegistry,
    version: AtomicU64,
    publish_lock: Mutex<()>,
}

impl PublishedSynonyms {
    pub fn new(initial: SynonymMap) -> Self {
        PublishedSynonyms {
            current: ArcSwap::from_pointee(initial),
            consumers: ConsumerRegistry::new(),
            version: AtomicU64::new(0),
            publish_lock: Mutex::new(()),
        }
    }

    /// The map new filters start from.
    pub fn current(&self) -> Arc<SynonymMap> {
        self.current.load_full()
    }

    /// Number of successful publishes so far.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub fn consumers(&self) -> &ConsumerRegistry {
        &self.consumers
    }

    /// Make `map` current and push it to every live consumer.
    ///
    /// Returns how many consumers received it.
    pub fn publish(&self, map: Arc<SynonymMap>) -> usize {
        let _serialized = self.publish_lock.lock();

        self.current.store(Arc::clone(&map));
        self.version.fetch_add(1, Ordering::AcqRel);

        let slots = self.consumers.live();
        for slot in &slots {
            slot.store(Arc::clone(&map));
        }
        slots.len()
    }

    /// Register a new consumer seeded with the current map.
    ///
    /// The seed is read under the arena lock, so a concurrent publish either
    /// seeds the slot or reaches it afterwards.
    pub fn attach(self: &Arc<Self>) -> (MapSlot, ConsumerHandle) {
        let (key, slot) = self
            .consumers
            .register_with(|| Arc::new(ArcSwap::new(self.current.load_full())));

        let handle = ConsumerHandle {
            key,
            published: Arc::downgrade(self),
        };
        (slot, handle)
    }
}

impl fmt::Debug for PublishedSynonyms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishedSynonyms")
            .field("current", &self.current())
            .field("consumers", &self.consumers.len())
            .field("version", &self.version())
            .finish()
    }
}

/// Deregisters its consumer when dropped.
#[derive(Debug)]
pub struct ConsumerHandle {
    key: ConsumerKey,
    published: Weak<PublishedSynonyms>,
}

impl ConsumerHandle {
    pub fn key(&self) -> ConsumerKey {
        self.key
    }
}

impl Drop for ConsumerHandle {
    fn drop(&mut self) {
        if let Some(published) = self.published.upgrade() {
            published.consumers.deregister(self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synonym::map::EntryCollector;

    fn map_with(input: &str, output: &str) -> Arc<SynonymMap> {
        let mut collector = EntryCollector::new();
        collector.add(&[input.to_string()], &[output.to_string()]);
        Arc::new(collector.finish().unwrap())
    }

    #[test]
    fn test_register_and_deregister() {
        let registry = ConsumerRegistry::new();
        let a = registry.register(Arc::new(ArcSwap::from_pointee(SynonymMap::empty())));
        let b = registry.register(Arc::new(ArcSwap::from_pointee(SynonymMap::empty())));
        assert_eq!(registry.len(), 2);

        assert!(registry.deregister(a));
        assert!(!registry.deregister(a));
        assert_eq!(registry.len(), 1);

        // Reused entry gets a new generation.
        let c = registry.register(Arc::new(ArcSwap::from_pointee(SynonymMap::empty())));
        assert_ne!(a, c);
        assert!(!registry.deregister(a));
        assert!(registry.deregister(b));
        assert!(registry.deregister(c));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_publish_reaches_attached_consumers() {
        let published = Arc::new(PublishedSynonyms::new(SynonymMap::empty()));
        let (slot_a, _handle_a) = published.attach();
        let (slot_b, handle_b) = published.attach();
        assert!(slot_a.load().is_empty());

        let map = map_with("big", "large");
        assert_eq!(published.publish(Arc::clone(&map)), 2);
        assert!(Arc::ptr_eq(&slot_a.load_full(), &map));
        assert!(Arc::ptr_eq(&slot_b.load_full(), &map));
        assert_eq!(published.version(), 1);

        drop(handle_b);
        assert_eq!(published.consumers().len(), 1);
        assert_eq!(published.publish(map_with("tv", "television")), 1);

        // The dropped consumer keeps whatever it last saw.
        assert!(Arc::ptr_eq(&slot_b.load_full(), &map));
    }

    #[test]
    fn test_attach_after_publish_sees_latest() {
        let published = Arc::new(PublishedSynonyms::new(SynonymMap::empty()));
        let map = map_with("big", "large");
        published.publish(Arc::clone(&map));

        let (slot, _handle) = published.attach();
        assert!(Arc::ptr_eq(&slot.load_full(), &map));
    }

    #[test]
    fn test_handle_outliving_state_is_harmless() {
        let published = Arc::new(PublishedSynonyms::new(SynonymMap::empty()));
        let (_slot, handle) = published.attach();
        drop(published);
        drop(handle);
    }
}
