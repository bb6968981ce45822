//! Registry storage.
//!
//! [`ServiceStore`] is the persistence seam of the registry. The bundled
//! [`MemoryStore`] keeps instances in a [`DashMap`]; a deployment wanting
//! durable storage implements the trait over its own backend.

use crate::service::{ServiceInstance, Version};
use anyhow::bail;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

pub trait ServiceStore: Send + Sync {
    /// Look up the instance registered under exactly `(name, version)`
    fn find_exact(
        &self,
        name: &str,
        version: Version,
    ) -> impl Future<Output = anyhow::Result<Option<ServiceInstance>>> + Send;

    /// Persist a new instance. Fails if the exact tuple is already stored.
    fn insert(&self, instance: ServiceInstance) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Delete the exact tuple, returning whether a record was removed
    fn remove(
        &self,
        name: &str,
        version: Version,
    ) -> impl Future<Output = anyhow::Result<bool>> + Send;

    /// Version-range query for call resolution.
    ///
    /// Matches `name` and `major` exactly; `minor` and `patch` are
    /// independent per-field floors (an instance with a higher minor but a
    /// patch below the requested patch does NOT match). This is not a
    /// lexicographic semver comparison. Results are ordered descending by
    /// `(minor, patch)` so the newest compatible instance comes first. An
    /// empty result is not an error at this layer.
    fn find_compatible(
        &self,
        name: &str,
        version: Version,
    ) -> impl Future<Output = anyhow::Result<Vec<ServiceInstance>>> + Send;
}

/// In-memory store keyed by `(name, version)`
#[derive(Debug, Default)]
pub struct MemoryStore {
    services: DashMap<(String, Version), ServiceInstance>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ServiceStore for MemoryStore {
    async fn find_exact(&self, name: &str, version: Version) -> anyhow::Result<Option<ServiceInstance>> {
        Ok(self
            .services
            .get(&(name.to_string(), version))
            .map(|entry| entry.clone()))
    }

    async fn insert(&self, instance: ServiceInstance) -> anyhow::Result<()> {
        match self
            .services
            .entry((instance.name.clone(), instance.version))
        {
            Entry::Occupied(_) => {
                bail!(
                    "service {} {} is already stored",
                    instance.name,
                    instance.version
                )
            }
            Entry::Vacant(vacant) => {
                vacant.insert(instance);
                Ok(())
            }
        }
    }

    async fn remove(&self, name: &str, version: Version) -> anyhow::Result<bool> {
        Ok(self
            .services
            .remove(&(name.to_string(), version))
            .is_some())
    }

    async fn find_compatible(
        &self,
        name: &str,
        version: Version,
    ) -> anyhow::Result<Vec<ServiceInstance>> {
        let mut list = self
            .services
            .iter()
            .filter(|entry| {
                let found = &entry.version;
                entry.name == name
                    && found.major == version.major
                    && found.minor >= version.minor
                    && found.patch >= version.patch
            })
            .map(|entry| entry.clone())
            .collect::<Vec<_>>();
        list.sort_by(|a, b| {
            (b.version.minor, b.version.patch).cmp(&(a.version.minor, a.version.patch))
        });
        Ok(list)
    }
}
