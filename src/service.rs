use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic version triple of a service instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Version {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl From<(u32, u32, u32)> for Version {
    fn from((major, minor, patch): (u32, u32, u32)) -> Self {
        Version::new(major, minor, patch)
    }
}

/// Transport kind of an endpoint.
///
/// Kinds not recognized by this crate deserialize to [`EndpointKind::Other`]
/// and are skipped at dispatch time without affecting the aggregate result,
/// so registrations carrying a newer transport kind do not poison the
/// endpoints this crate does understand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EndpointKind {
    HttpGet,
    HttpPost,
    MessageQueue,
    Other(String),
}

impl From<String> for EndpointKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "http-get" => EndpointKind::HttpGet,
            "http-post" => EndpointKind::HttpPost,
            "message-queue" => EndpointKind::MessageQueue,
            _ => EndpointKind::Other(value),
        }
    }
}

impl From<EndpointKind> for String {
    fn from(value: EndpointKind) -> Self {
        value.to_string()
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointKind::HttpGet => write!(f, "http-get"),
            EndpointKind::HttpPost => write!(f, "http-post"),
            EndpointKind::MessageQueue => write!(f, "message-queue"),
            EndpointKind::Other(kind) => write!(f, "{}", kind),
        }
    }
}

/// One addressable endpoint of a service instance.
///
/// `url` is transport specific: an HTTP URL for the HTTP kinds, a routing
/// key for `message-queue`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub kind: EndpointKind,
    pub url: String,
}

impl Endpoint {
    pub fn new(kind: EndpointKind, url: impl Into<String>) -> Self {
        Endpoint {
            kind,
            url: url.into(),
        }
    }
}

/// One registered, addressable implementation of a logical service.
///
/// `(name, version)` is the registry identity: registering the same tuple
/// twice fails. Instances are read-only once registered; a version bump is
/// unregister-then-register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
pub struct ServiceInstance {
    /// Logical service name, not unique on its own
    #[builder(setter(into))]
    pub name: String,
    /// Version triple, unique per name
    #[builder(setter(into))]
    pub version: Version,
    /// Informational base URL, never used for dispatch
    #[builder(setter(into))]
    pub url: String,
    /// Endpoints fanned out to on every call, in declaration order
    pub endpoints: Vec<Endpoint>,
    /// Roles recorded at registration. Stored only, never enforced here.
    #[serde(default)]
    #[builder(default)]
    pub authorized_roles: Vec<String>,
}

impl ServiceInstance {
    /// Registration-time validation.
    ///
    /// Returns the first failed check as a human-readable reason. Version
    /// fields are unsigned and need no lower-bound check.
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("service name must not be empty".to_string());
        }
        if self.url.is_empty() {
            return Err("service url must not be empty".to_string());
        }
        if self.endpoints.is_empty() {
            return Err("service must declare at least one endpoint".to_string());
        }
        for endpoint in &self.endpoints {
            if matches!(&endpoint.kind, EndpointKind::Other(kind) if kind.is_empty()) {
                return Err("endpoint kind must not be empty".to_string());
            }
            if endpoint.url.is_empty() {
                return Err("endpoint url must not be empty".to_string());
            }
        }
        if self.authorized_roles.iter().any(|role| role.is_empty()) {
            return Err("authorized roles must not contain empty names".to_string());
        }
        Ok(())
    }
}
