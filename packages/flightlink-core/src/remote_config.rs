//! # Remote Configuration
//!
//! Fetches this service's own configuration from a Spring-style config
//! server and decodes it into a typed [`ConfigSnapshot`].
//!
//! ```text
//! GET {url}/{service}/default
//!     X-Client-Id: ...
//!     X-Client-Secret: ...
//!
//! { "name": "airlines-b",
//!   "propertySources": [
//!       { "name": "overrides", "source": { "config.queues.inbound": "b-in" } },   ← wins
//!       { "name": "base",      "source": { "config.queues.inbound": "old",
//!                                          "config.queues.outbound": "b-out" } }
//!   ] }
//! ```
//!
//! Sources are listed highest priority first, so they are merged last to
//! first and index 0 overrides everything after it.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::ConfigServerConfig;
use crate::error::{Error, Result};
use crate::scheduler::PeriodicTask;

pub const KEY_INBOUND_QUEUE: &str = "config.queues.inbound";
pub const KEY_OUTBOUND_QUEUE: &str = "config.queues.outbound";
pub const KEY_PUBLIC_KEY: &str = "config.security.public-key";
pub const KEY_TARGET_PUBLIC_KEY: &str = "config.security.target-public-key";

/// Config server response body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigServerResponse {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub profiles: Vec<String>,
    #[serde(default)]
    pub property_sources: Vec<PropertySource>,
}

/// One named layer of properties
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertySource {
    pub name: String,
    #[serde(default)]
    pub source: Map<String, Value>,
}

impl ConfigServerResponse {
    /// Flatten the sources, index 0 taking priority
    pub fn merged_properties(&self) -> Map<String, Value> {
        let mut merged = Map::new();
        for source in self.property_sources.iter().rev() {
            for (key, value) in &source.source {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }
}

/// Typed view of this service's merged configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSnapshot {
    /// Queue this service consumes envelopes from
    pub inbound_queue: String,
    pub outbound_queue: Option<String>,
    pub public_key: Option<String>,
    pub target_public_key: Option<String>,
    properties: Map<String, Value>,
}

impl ConfigSnapshot {
    /// Decode the well-known keys out of a merged property map
    ///
    /// ## Errors
    ///
    /// `Format` when the inbound queue is missing or blank, or when a
    /// well-known key holds something other than a string.
    pub fn from_properties(properties: Map<String, Value>) -> Result<Self> {
        let inbound_queue = string_property(&properties, KEY_INBOUND_QUEUE)?
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| {
                Error::Format(format!("Required property '{}' is missing", KEY_INBOUND_QUEUE))
            })?;

        Ok(Self {
            inbound_queue,
            outbound_queue: string_property(&properties, KEY_OUTBOUND_QUEUE)?,
            public_key: string_property(&properties, KEY_PUBLIC_KEY)?,
            target_public_key: string_property(&properties, KEY_TARGET_PUBLIC_KEY)?,
            properties,
        })
    }

    pub fn from_response(response: &ConfigServerResponse) -> Result<Self> {
        Self::from_properties(response.merged_properties())
    }

    /// Raw merged property
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }
}

fn string_property(properties: &Map<String, Value>, key: &str) -> Result<Option<String>> {
    match properties.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(Error::Format(format!(
            "Property '{}' must be a string, got {}",
            key, other
        ))),
    }
}

// ── Sources ────────────────────────────────────────────────────────────────

/// Where configuration snapshots come from
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn fetch(&self) -> Result<ConfigServerResponse>;
}

/// HTTP client for `GET {url}/{service}/default`
pub struct ConfigServerClient {
    client: Client,
    config: ConfigServerConfig,
}

impl ConfigServerClient {
    pub fn new(config: ConfigServerConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub(crate) fn endpoint(&self) -> String {
        format!(
            "{}/{}/default",
            self.config.url.trim_end_matches('/'),
            self.config.service_name
        )
    }
}

#[async_trait]
impl ConfigSource for ConfigServerClient {
    async fn fetch(&self) -> Result<ConfigServerResponse> {
        let url = self.endpoint();
        tracing::debug!(url = %url, "Fetching own configuration");

        let mut request = self.client.get(&url);
        if let Some(ref id) = self.config.client_id {
            request = request.header("X-Client-Id", id);
        }
        if let Some(ref secret) = self.config.client_secret {
            request = request.header("X-Client-Secret", secret);
        }

        let body = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::ConfigFetch(e.to_string()))?
            .text()
            .await
            .map_err(|e| Error::ConfigFetch(e.to_string()))?;

        parse_config_response(&body)
    }
}

/// Decode a config server body; shape mismatches are `Format`
pub fn parse_config_response(body: &str) -> Result<ConfigServerResponse> {
    serde_json::from_str(body)
        .map_err(|e| Error::Format(format!("Invalid config server response: {}", e)))
}

// ── Snapshot cache ─────────────────────────────────────────────────────────

/// Holds the latest good [`ConfigSnapshot`]
///
/// A failed refresh keeps the previous snapshot.
pub struct ConfigSnapshotCache {
    source: Arc<dyn ConfigSource>,
    current: RwLock<Option<Arc<ConfigSnapshot>>>,
}

impl ConfigSnapshotCache {
    pub fn new(source: Arc<dyn ConfigSource>) -> Self {
        Self {
            source,
            current: RwLock::new(None),
        }
    }

    /// Latest snapshot without fetching
    pub fn current(&self) -> Option<Arc<ConfigSnapshot>> {
        self.current.read().clone()
    }

    /// Latest snapshot, fetching once if none has been loaded yet
    pub async fn get(&self) -> Result<Arc<ConfigSnapshot>> {
        match self.current() {
            Some(snapshot) => Ok(snapshot),
            None => self.refresh().await,
        }
    }

    /// Fetch and decode a new snapshot
    pub async fn refresh(&self) -> Result<Arc<ConfigSnapshot>> {
        let response = self.source.fetch().await?;
        let snapshot = Arc::new(ConfigSnapshot::from_response(&response)?);

        *self.current.write() = Some(Arc::clone(&snapshot));
        tracing::info!(
            service = ?response.name,
            sources = response.property_sources.len(),
            inbound_queue = %snapshot.inbound_queue,
            "Configuration updated"
        );
        Ok(snapshot)
    }
}

#[async_trait]
impl PeriodicTask for ConfigSnapshotCache {
    fn name(&self) -> &'static str {
        "config-refresh"
    }

    async fn run(&self) {
        if let Err(e) = self.refresh().await {
            tracing::warn!(
                error = %e,
                has_previous = self.current().is_some(),
                "Configuration refresh failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    fn response(sources: Value) -> ConfigServerResponse {
        serde_json::from_value(json!({
            "name": "airlines-b",
            "profiles": ["default"],
            "propertySources": sources
        }))
        .unwrap()
    }

    struct ScriptedSource {
        next: Mutex<Result<ConfigServerResponse>>,
    }

    #[async_trait]
    impl ConfigSource for ScriptedSource {
        async fn fetch(&self) -> Result<ConfigServerResponse> {
            self.next.lock().clone()
        }
    }

    #[test]
    fn test_first_source_wins() {
        let response = response(json!([
            { "name": "overrides", "source": { "config.queues.inbound": "b-in" } },
            { "name": "base", "source": {
                "config.queues.inbound": "old-in",
                "config.queues.outbound": "b-out"
            } }
        ]));

        let snapshot = ConfigSnapshot::from_response(&response).unwrap();
        assert_eq!(snapshot.inbound_queue, "b-in");
        assert_eq!(snapshot.outbound_queue.as_deref(), Some("b-out"));
        assert_eq!(snapshot.properties().len(), 2);
    }

    #[test]
    fn test_missing_inbound_queue_is_format_error() {
        let response = response(json!([
            { "name": "base", "source": { "config.queues.outbound": "b-out" } }
        ]));
        let err = ConfigSnapshot::from_response(&response).unwrap_err();
        assert!(matches!(err, Error::Format(ref m) if m.contains(KEY_INBOUND_QUEUE)));
    }

    #[test]
    fn test_non_string_property_is_format_error() {
        let response = response(json!([
            { "name": "base", "source": {
                "config.queues.inbound": "b-in",
                "config.security.public-key": 42
            } }
        ]));
        assert!(matches!(
            ConfigSnapshot::from_response(&response),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn test_malformed_body_is_format_error() {
        let body = r#"{"name": "airlines-b", "propertySources": {"name": "base"}}"#;
        assert!(matches!(parse_config_response(body), Err(Error::Format(_))));
        assert!(matches!(parse_config_response("<html>"), Err(Error::Format(_))));

        let ok = parse_config_response(
            r#"{"name": "airlines-b", "propertySources": [{"name": "base", "source": {"config.queues.inbound": "b-in"}}]}"#,
        )
        .unwrap();
        assert_eq!(ConfigSnapshot::from_response(&ok).unwrap().inbound_queue, "b-in");
    }

    #[test]
    fn test_endpoint() {
        let client = ConfigServerClient::new(ConfigServerConfig {
            url: "http://config:8888/".into(),
            ..ConfigServerConfig::default()
        });
        assert_eq!(client.endpoint(), "http://config:8888/airlines-b/default");
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let source = Arc::new(ScriptedSource {
            next: Mutex::new(Ok(response(json!([
                { "name": "base", "source": { "config.queues.inbound": "b-in" } }
            ])))),
        });
        let cache = ConfigSnapshotCache::new(source.clone());

        let first = cache.get().await.unwrap();
        *source.next.lock() = Err(Error::ConfigFetch("connection refused".into()));

        assert!(cache.refresh().await.is_err());
        cache.run().await;

        let current = cache.current().unwrap();
        assert!(Arc::ptr_eq(&first, &current));
        assert!(Arc::ptr_eq(&first, &cache.get().await.unwrap()));
    }

    #[tokio::test]
    async fn test_get_without_snapshot_surfaces_fetch_error() {
        let cache = ConfigSnapshotCache::new(Arc::new(ScriptedSource {
            next: Mutex::new(Err(Error::ConfigFetch("down".into()))),
        }));
        assert!(matches!(cache.get().await, Err(Error::ConfigFetch(_))));
        assert!(cache.current().is_none());
    }
}
