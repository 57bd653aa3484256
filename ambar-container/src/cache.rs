//! Concurrent instance cache with get-or-create semantics.
//!
//! Each key maps to a [`OnceCell`]. The map lock is held only while the
//! cell is fetched; construction runs outside it, serialized per key by the
//! cell, so factories may resolve other keys of the same cache.

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use tracing::{debug, trace};

use crate::error::Result;
use crate::instance::Instance;
use crate::key::CacheKey;

#[derive(Default)]
pub(crate) struct InstanceCache {
    cells: DashMap<CacheKey, Arc<OnceCell<Instance>>>,
}

impl InstanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached instance for `key`, creating it with `create` on
    /// first use.
    ///
    /// Concurrent first requests for one key run `create` once; the others
    /// wait and receive the same instance. A failed `create` caches nothing.
    ///
    /// Returns `Ok(None)` when the cache was drained while the instance was
    /// being built: nobody else owns it then, so it is disposed here.
    pub fn get_or_try_insert_with(
        &self,
        key: CacheKey,
        create: impl FnOnce() -> Result<Instance>,
    ) -> Result<Option<Instance>> {
        let cell = self.cells.entry(key.clone()).or_default().value().clone();

        if let Some(instance) = cell.get() {
            trace!(instance = instance.type_name(), "Cache hit");
            return Ok(Some(instance.clone()));
        }

        let instance = cell.get_or_try_init(create)?.clone();

        let still_cached = self
            .cells
            .get(&key)
            .is_some_and(|entry| Arc::ptr_eq(entry.value(), &cell));
        if !still_cached {
            debug!(instance = instance.type_name(), "Cache drained during construction, disposing");
            instance.dispose();
            return Ok(None);
        }

        Ok(Some(instance))
    }

    /// Removes every entry, returning the instances that were built.
    pub fn drain(&self) -> Vec<Instance> {
        let mut drained = Vec::new();
        self.cells.retain(|_, cell| {
            if let Some(instance) = cell.get() {
                drained.push(instance.clone());
            }
            false
        });
        drained
    }

    /// Number of built instances.
    pub fn len(&self) -> usize {
        self.cells.iter().filter(|entry| entry.value().get().is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AmbarError;
    use crate::instance::Dispose;
    use crate::key::{Producer, TypeKey};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;

    fn key<T: 'static>() -> CacheKey {
        CacheKey {
            service: TypeKey::of::<T>(),
            producer: Producer::Type(TypeKey::of::<T>()),
        }
    }

    #[test]
    fn creates_once() {
        let cache = InstanceCache::new();
        let calls = AtomicU32::new(0);
        let create = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Instance::new(Arc::new(1u8)))
        };

        let a = cache.get_or_try_insert_with(key::<u8>(), create).unwrap().unwrap();
        let b = cache.get_or_try_insert_with(key::<u8>(), create).unwrap().unwrap();
        assert!(a.ptr_eq(&b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failure_is_not_cached() {
        let cache = InstanceCache::new();
        let failed = cache.get_or_try_insert_with(key::<u8>(), || {
            Err(AmbarError::construction_failed::<u8>("boom"))
        });
        assert!(failed.is_err());
        assert_eq!(cache.len(), 0);

        let ok = cache.get_or_try_insert_with(key::<u8>(), || Ok(Instance::new(Arc::new(2u8))));
        assert!(ok.unwrap().is_some());
    }

    #[test]
    fn nested_creation_of_other_key() {
        let cache = InstanceCache::new();
        let outer = cache
            .get_or_try_insert_with(key::<u16>(), || {
                let inner = cache
                    .get_or_try_insert_with(key::<u8>(), || Ok(Instance::new(Arc::new(3u8))))?
                    .unwrap();
                let value = *inner.downcast::<u8>().unwrap();
                Ok(Instance::new(Arc::new(u16::from(value))))
            })
            .unwrap()
            .unwrap();
        assert_eq!(*outer.downcast::<u16>().unwrap(), 3);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn concurrent_first_requests_share_one_instance() {
        let cache = Arc::new(InstanceCache::new());
        let calls = Arc::new(AtomicU32::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let calls = calls.clone();
                thread::spawn(move || {
                    cache
                        .get_or_try_insert_with(key::<u32>(), || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(std::time::Duration::from_millis(5));
                            Ok(Instance::new(Arc::new(9u32)))
                        })
                        .unwrap()
                        .unwrap()
                })
            })
            .collect();

        let instances: Vec<Instance> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(instances.iter().all(|i| i.ptr_eq(&instances[0])));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drain_empties_cache() {
        let cache = InstanceCache::new();
        cache.get_or_try_insert_with(key::<u8>(), || Ok(Instance::new(Arc::new(1u8)))).unwrap();
        cache.get_or_try_insert_with(key::<u16>(), || Ok(Instance::new(Arc::new(1u16)))).unwrap();

        assert_eq!(cache.drain().len(), 2);
        assert_eq!(cache.len(), 0);
        assert!(cache.drain().is_empty());
    }

    #[test]
    fn instance_built_while_draining_is_disposed() {
        struct Handle(AtomicU32);
        impl Dispose for Handle {
            fn dispose(&self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let cache = InstanceCache::new();
        let handle = Arc::new(Handle(AtomicU32::new(0)));

        let fetched = cache
            .get_or_try_insert_with(key::<Handle>(), || {
                // disposal runs while construction is in flight
                assert!(cache.drain().is_empty());
                Ok(Instance::disposable(handle.clone()))
            })
            .unwrap();

        assert!(fetched.is_none());
        assert_eq!(handle.0.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 0);
    }
}
