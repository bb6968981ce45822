//! # dispreg
//!
//! A lightweight service-discovery and request-dispatch library: services
//! register themselves under a semantic-versioned name with one or more
//! transport endpoints, and callers invoke a logical service by name and
//! minimum acceptable version without knowing which concrete instance, host,
//! or transport answers.
//!
//! Two pieces do the heavy lifting:
//! - **version-aware resolution with sequential failover**: a call resolves
//!   to every compatible instance (same name, same major, minor and patch
//!   each at or above the requested floor), ordered newest first, and tries
//!   them one at a time until one answers in full;
//! - a **transport-agnostic fanout dispatcher**: every endpoint of the
//!   chosen instance is invoked concurrently (`http-get`, `http-post`,
//!   `message-queue`), all outcomes are awaited, and the successful
//!   responses are shallow-merged into one object. A candidate with any
//!   failing endpoint is discarded whole and the next candidate is tried.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use dispreg::{Endpoint, EndpointKind, Registry, ServiceInstanceBuilder, Version};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = Registry::in_memory();
//!
//!     registry
//!         .register(
//!             ServiceInstanceBuilder::default()
//!                 .name("Ticket Query")
//!                 .version(Version::new(1, 0, 0))
//!                 .url("http://127.0.0.1:3000")
//!                 .endpoints(vec![Endpoint::new(
//!                     EndpointKind::HttpGet,
//!                     "http://127.0.0.1:3000/tickets",
//!                 )])
//!                 .build()?,
//!         )
//!         .await?;
//!
//!     // Resolves to the newest compatible instance and fails over to older
//!     // ones until a candidate answers on every endpoint.
//!     let response = registry
//!         .call("Ticket Query", Version::new(1, 0, 0), None)
//!         .await?;
//!     println!("{}", response);
//!     Ok(())
//! }
//! ```
//!
//! # Message-queue endpoints
//!
//! `message-queue` endpoints speak single-shot request/reply over AMQP. The
//! process owns the broker connection and injects a channel:
//!
//! ```rust,no_run
//! # use dispreg::Registry;
//! # async fn demo() -> anyhow::Result<()> {
//! let connection = lapin::Connection::connect(
//!     "amqp://127.0.0.1:5672",
//!     lapin::ConnectionProperties::default(),
//! )
//! .await?;
//! let registry = Registry::in_memory().with_broker(connection.create_channel().await?);
//! # Ok(())
//! # }
//! ```
//!
//! Or let the registry manage the connection from configuration:
//!
//! ```yaml
//! dispreg:
//!   broker-addr: amqp://127.0.0.1:5672
//!   http-connect-timeout-secs: 5
//! ```
//!
//! ```rust,no_run
//! # use dispreg::{DispregConfig, Registry};
//! # async fn demo() -> anyhow::Result<()> {
//! let config = DispregConfig::from_file("dispreg.yaml")?;
//! let registry = Registry::from_config(&config).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # What this crate is not
//!
//! It is a client of a message broker, not a broker; it provides no durable
//! queues, records `authorized_roles` without enforcing them, and does no
//! load-balancing beyond "prefer the higher version, move to the next
//! candidate on failure".

pub mod conf;
pub mod dispatch;
pub mod registry;
pub mod service;
pub mod store;
pub mod transport;
pub mod utils;

pub use conf::{DispregConfig, DispregConfigBuilder};
pub use dispatch::{Aggregated, Dispatcher};
pub use registry::{Registry, RegistryError};
pub use service::{Endpoint, EndpointKind, ServiceInstance, ServiceInstanceBuilder, Version};
pub use store::{MemoryStore, ServiceStore};
pub use transport::{DispatchError, HttpTransport, MqTransport};
