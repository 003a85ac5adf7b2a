//! Resolve-once storage of service instances

use crate::definition::Service;
use std::collections::HashMap;

/// Holds the instances produced by singleton retrieval.
///
/// Entries are never evicted, they live as long as the owning container.
#[derive(Default)]
pub struct InstanceCache {
    services: HashMap<String, Service>
}

impl std::fmt::Debug for InstanceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set()
            .entries(self.services.keys())
            .finish()
    }
}

impl InstanceCache {
    /// Creates an empty cache
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `service` under `id`, replacing any previous instance
    #[inline]
    pub fn insert(&mut self, id: impl Into<String>, service: Service) {
        self.services.insert(id.into(), service);
    }

    /// Stores `service` under `id` unless an instance is already there.
    ///
    /// Returns the instance that ends up cached.
    pub fn get_or_insert(&mut self, id: &str, service: Service) -> Service {
        self.services
            .entry(id.to_string())
            .or_insert(service)
            .clone()
    }

    /// Returns the cached instance for `id`
    #[inline]
    pub fn get(&self, id: &str) -> Option<Service> {
        self.services.get(id).cloned()
    }

    /// Returns `true` if there is a cached instance for `id`
    #[inline]
    pub fn contains(&self, id: &str) -> bool {
        self.services.contains_key(id)
    }

    /// Returns the number of cached instances
    #[inline]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns `true` if nothing is cached
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
