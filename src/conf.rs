/// Configuration component
use derive_builder::Builder;
use serde::Deserialize;
use std::path::Path;

/// Wrapped because the top-level key in the configuration file is `dispreg`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DispregConfigWrapper {
    pub(crate) dispreg: DispregConfig,
}

/// Registry and transport configuration
#[derive(Debug, Clone, Default, Deserialize, Builder)]
#[serde(rename_all = "kebab-case")]
pub struct DispregConfig {
    /// AMQP broker address, e.g.: amqp://127.0.0.1:5672
    ///
    /// When set, [`Registry::from_config`](crate::Registry::from_config)
    /// establishes the process-wide broker connection and enables
    /// `message-queue` endpoints.
    #[serde(default)]
    #[builder(setter(strip_option, into), default)]
    pub broker_addr: Option<String>,
    /// HTTP connect timeout in seconds. Unset means no timeout beyond what
    /// the network stack imposes.
    #[serde(default)]
    #[builder(setter(strip_option), default)]
    pub http_connect_timeout_secs: Option<u64>,
}

impl DispregConfig {
    /// Load configuration from a `dispreg:`-rooted YAML file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub(crate) fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let wrapper = serde_yaml::from_str::<DispregConfigWrapper>(content)?;
        Ok(wrapper.dispreg)
    }
}
