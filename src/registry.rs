//! Service registry and failover caller.
//!
//! [`Registry`] owns the store and the dispatch engine. `call` resolves a
//! logical name plus minimum version to an ordered candidate list and walks
//! it sequentially: the first candidate whose fanout settles with no failing
//! endpoint wins, and a losing candidate's partial data is discarded rather
//! than merged forward.

use crate::conf::DispregConfig;
use crate::dispatch::Dispatcher;
use crate::service::{ServiceInstance, Version};
use crate::store::{MemoryStore, ServiceStore};
use crate::transport::{HttpTransport, MqTransport};
use lapin::{Channel, Connection, ConnectionProperties};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

#[derive(Debug)]
pub enum RegistryError {
    /// Malformed registration payload, with the first failed check
    InvalidService(String),
    /// The exact `(name, version)` tuple is already registered
    DuplicateService(String, Version),
    /// Unregister target does not exist
    NotFound(String, Version),
    /// No candidate resolved, or every candidate's fanout had a failure
    NoServiceAvailable(String),
    /// Underlying store failure
    Store(anyhow::Error),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::InvalidService(reason) => write!(f, "invalid service: {}", reason),
            RegistryError::DuplicateService(name, version) => {
                write!(f, "service {} {} is already registered", name, version)
            }
            RegistryError::NotFound(name, version) => {
                write!(f, "service {} {} not found", name, version)
            }
            RegistryError::NoServiceAvailable(name) => {
                write!(f, "no service available for {}", name)
            }
            RegistryError::Store(e) => write!(f, "store error: {}", e),
        }
    }
}

impl std::error::Error for RegistryError {}

impl From<anyhow::Error> for RegistryError {
    fn from(e: anyhow::Error) -> Self {
        RegistryError::Store(e)
    }
}

pub struct Registry<S: ServiceStore = MemoryStore> {
    store: S,
    dispatcher: Dispatcher,
    /// Broker connection owned on behalf of the process when the registry
    /// was built from configuration. Kept alive for as long as dispatches
    /// may run; adapters only ever see a channel on it.
    broker: Option<Connection>,
}

impl Registry<MemoryStore> {
    /// Registry over the in-memory store, HTTP transport only
    pub fn in_memory() -> Self {
        Self::with_store(MemoryStore::new())
    }

    /// Build from configuration: applies the optional HTTP connect timeout
    /// and, when a broker address is configured, establishes the process-wide
    /// broker connection and attaches the message-queue transport.
    pub async fn from_config(config: &DispregConfig) -> anyhow::Result<Self> {
        let http = match config.http_connect_timeout_secs {
            Some(secs) => HttpTransport::with_connect_timeout(Duration::from_secs(secs)),
            None => HttpTransport::new(),
        };

        let (broker, mq) = match &config.broker_addr {
            Some(addr) => {
                let connection =
                    Connection::connect(addr, ConnectionProperties::default()).await?;
                let channel = connection.create_channel().await?;
                log::info!("connected to broker at {}", addr);
                (Some(connection), Some(MqTransport::new(channel)))
            }
            None => (None, None),
        };

        Ok(Registry {
            store: MemoryStore::new(),
            dispatcher: Dispatcher::new(http, mq),
            broker,
        })
    }
}

impl<S: ServiceStore> Registry<S> {
    pub fn with_store(store: S) -> Self {
        Registry {
            store,
            dispatcher: Dispatcher::new(HttpTransport::new(), None),
            broker: None,
        }
    }

    /// Attach a message-queue transport over a channel whose connection the
    /// caller owns and keeps alive.
    pub fn with_broker(mut self, channel: Channel) -> Self {
        self.dispatcher = self.dispatcher.with_mq(MqTransport::new(channel));
        self
    }

    pub fn with_http_transport(mut self, http: HttpTransport) -> Self {
        self.dispatcher = self.dispatcher.with_http(http);
        self
    }

    /// The broker connection owned by this registry, when it was built from
    /// configuration with a broker address.
    pub fn broker_connection(&self) -> Option<&Connection> {
        self.broker.as_ref()
    }

    /// Register a service instance.
    ///
    /// Validation failures and exact-tuple duplicates are surfaced
    /// immediately; neither is retried.
    pub async fn register(&self, service: ServiceInstance) -> Result<(), RegistryError> {
        if let Err(reason) = service.validate() {
            return Err(RegistryError::InvalidService(reason));
        }
        if self
            .store
            .find_exact(&service.name, service.version)
            .await?
            .is_some()
        {
            return Err(RegistryError::DuplicateService(
                service.name,
                service.version,
            ));
        }
        log::debug!("registering service {} {}", service.name, service.version);
        self.store.insert(service).await?;
        Ok(())
    }

    /// Unregister the exact `(name, version)` tuple.
    ///
    /// Removal is best-effort once the record is confirmed present: the
    /// caller's intent, "this version should no longer serve", is already
    /// satisfied by the lookup, so a deletion failure is logged but still
    /// reported as success.
    pub async fn unregister(&self, name: &str, version: Version) -> Result<(), RegistryError> {
        log::debug!("unregistering service: {}", name);
        if self.store.find_exact(name, version).await?.is_none() {
            return Err(RegistryError::NotFound(name.to_string(), version));
        }
        match self.store.remove(name, version).await {
            Ok(removed) => {
                if removed {
                    log::debug!("removed service: {}", name);
                }
            }
            Err(e) => log::error!("failed to remove service {} {}: {}", name, version, e),
        }
        Ok(())
    }

    /// Resolve a logical call to the ordered candidate list, newest
    /// compatible instance first. An empty list is not an error here;
    /// [`Registry::call`] turns it into [`RegistryError::NoServiceAvailable`].
    pub async fn resolve(
        &self,
        name: &str,
        version: Version,
    ) -> Result<Vec<ServiceInstance>, RegistryError> {
        Ok(self.store.find_compatible(name, version).await?)
    }

    /// Call a logical service by name and minimum acceptable version.
    ///
    /// Candidates are tried strictly in order; a candidate only counts as
    /// answered when every one of its endpoints succeeded. Partial data from
    /// a failing candidate is discarded, and the next candidate's
    /// aggregation starts fresh.
    pub async fn call(
        &self,
        name: &str,
        version: Version,
        payload: Option<Value>,
    ) -> Result<Value, RegistryError> {
        let candidates = self.resolve(name, version).await?;
        if candidates.is_empty() {
            return Err(RegistryError::NoServiceAvailable(name.to_string()));
        }

        for candidate in &candidates {
            log::debug!("calling {} version {}", candidate.name, candidate.version);
            let aggregated = self.dispatcher.dispatch(candidate, payload.as_ref()).await;
            if aggregated.had_failure {
                log::info!("failed call to {} {}", candidate.name, candidate.version);
            } else {
                log::info!("succeeded call to {} {}", candidate.name, candidate.version);
                return Ok(aggregated.into_value());
            }
        }

        Err(RegistryError::NoServiceAvailable(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{Endpoint, EndpointKind, ServiceInstanceBuilder};
    use anyhow::bail;

    fn instance(name: &str, major: u32, minor: u32, patch: u32) -> ServiceInstance {
        ServiceInstanceBuilder::default()
            .name(name)
            .version(Version::new(major, minor, patch))
            .url("http://127.0.0.1:3000")
            .endpoints(vec![Endpoint::new(
                EndpointKind::HttpGet,
                "http://127.0.0.1:3000/tickets",
            )])
            .authorized_roles(vec!["admin".to_string()])
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn register_then_resolve_returns_the_instance() {
        let registry = Registry::in_memory();
        registry.register(instance("tickets", 1, 2, 3)).await.unwrap();

        let found = registry
            .resolve("tickets", Version::new(1, 0, 0))
            .await
            .unwrap();
        assert_eq!(found, vec![instance("tickets", 1, 2, 3)]);
    }

    #[tokio::test]
    async fn duplicate_registration_keeps_exactly_one_record() {
        let registry = Registry::in_memory();
        registry.register(instance("tickets", 1, 0, 0)).await.unwrap();

        let err = registry
            .register(instance("tickets", 1, 0, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateService(_, _)));

        let found = registry
            .resolve("tickets", Version::new(1, 0, 0))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn invalid_registration_is_rejected_with_the_reason() {
        let registry = Registry::in_memory();
        let mut service = instance("tickets", 1, 0, 0);
        service.endpoints.clear();

        let err = registry.register(service).await.unwrap_err();
        match err {
            RegistryError::InvalidService(reason) => {
                assert!(reason.contains("endpoint"));
            }
            other => panic!("expected InvalidService, got {}", other),
        }
    }

    #[tokio::test]
    async fn unregister_of_unknown_tuple_is_not_found() {
        let registry = Registry::in_memory();
        let err = registry
            .unregister("tickets", Version::new(1, 0, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_, _)));
    }

    #[tokio::test]
    async fn unregister_removes_the_exact_tuple() {
        let registry = Registry::in_memory();
        registry.register(instance("tickets", 1, 0, 0)).await.unwrap();
        registry.register(instance("tickets", 1, 1, 0)).await.unwrap();

        registry
            .unregister("tickets", Version::new(1, 0, 0))
            .await
            .unwrap();

        let found = registry
            .resolve("tickets", Version::new(1, 0, 0))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].version, Version::new(1, 1, 0));
    }

    #[tokio::test]
    async fn call_with_no_candidates_is_no_service_available() {
        let registry = Registry::in_memory();
        let err = registry
            .call("tickets", Version::new(1, 0, 0), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::NoServiceAvailable(_)));
    }

    /// Store that fails every operation, to check propagation through the
    /// storage seam.
    struct BrokenStore;

    impl ServiceStore for BrokenStore {
        async fn find_exact(
            &self,
            _name: &str,
            _version: Version,
        ) -> anyhow::Result<Option<ServiceInstance>> {
            bail!("store is down")
        }

        async fn insert(&self, _instance: ServiceInstance) -> anyhow::Result<()> {
            bail!("store is down")
        }

        async fn remove(&self, _name: &str, _version: Version) -> anyhow::Result<bool> {
            bail!("store is down")
        }

        async fn find_compatible(
            &self,
            _name: &str,
            _version: Version,
        ) -> anyhow::Result<Vec<ServiceInstance>> {
            bail!("store is down")
        }
    }

    #[tokio::test]
    async fn store_failures_surface_as_store_errors() {
        let registry = Registry::with_store(BrokenStore);
        let err = registry
            .register(instance("tickets", 1, 0, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Store(_)));

        let err = registry
            .call("tickets", Version::new(1, 0, 0), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Store(_)));
    }
}
