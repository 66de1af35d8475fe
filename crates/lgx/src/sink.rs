// ai
//! 🕳️ The Sink Facade: where events go in and nothing ever comes back out. Not even errors.
//!
//! 🎬 *[an event arrives. it is transcoded. it is resolved. it is dispatched.]*
//! *[another event arrives. it is malformed. it is counted. it is forgotten.]*
//! *[the stream does not notice. the stream never notices. that is the point.]*
//!
//! 🧠 Knowledge graph:
//! - [`EventSink`]: the three-call lifecycle the host drives (`start`, `on_event`, `stop`),
//!   plus `read_metrics`.
//! - [`ElasticsearchSink`]: builder → resolver → dispatcher, with every dropped event
//!   logged and counted exactly once, right here, and nowhere else.
//! - [`ElasticsearchSinkConfig`]: every knob, with the defaults the host agent expects
//!   (`flume` index, `log` type, default cluster, auto-discovery, UTF-8).
//! - Counters are atomics. `on_event` takes `&self`. Call it from as many tasks as you like.
//!
//! ⚠️ `on_event` never returns an error. If you want to know how it went, read the metrics.
//! Operators find out about bad input from the failure counter and the logs. 🦆

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, error, info, trace, warn};

use crate::backends::{self, SearchStore, StoreBackend};
use crate::common::Event;
use crate::dispatcher::Dispatcher;
use crate::document;
use crate::error::ForwardError;
use crate::index_resolver::IndexResolver;
use crate::transcode::Charset;

// ============================================================
//  🔧 ElasticsearchSinkConfig
// ============================================================

/// 🔧 Everything the sink needs to know, most of which it can guess.
///
/// `host_list` takes either a TOML array or a comma-separated string, because env vars
/// don't do arrays and humans don't do consistency.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ElasticsearchSinkConfig {
    /// 🪪 The cluster we expect to find on the other end.
    #[serde(default = "default_cluster_name")]
    pub cluster_name: String,
    /// 🏷️ Where documents go without a pattern, and the alias they're found under with one.
    #[serde(default = "default_static_index_name", alias = "index_name")]
    pub static_index_name: String,
    /// 📂 The document type every write is filed under.
    #[serde(default = "default_index_type")]
    pub index_type: String,
    /// 🗓️ e.g. `logs_%Y-%m-%d`. None means one static index forever.
    #[serde(default)]
    pub index_pattern: Option<String>,
    /// 📋 Nodes to talk to. Empty means "go find them yourself".
    #[serde(default, deserialize_with = "deserialize_host_list")]
    pub host_list: Vec<String>,
    /// 🔤 How opaque bytes become text.
    #[serde(default)]
    pub charset: Charset,
    /// 🏠 Skip the cluster entirely and index into this process's memory.
    #[serde(default)]
    pub local_only: bool,
    /// 🔭 Who to ask for the node list when `host_list` is empty.
    #[serde(default = "default_discovery_seed")]
    pub discovery_seed: String,
    /// 🔒 Username. The bouncer at the club. Except the club is a database.
    #[serde(default)]
    pub username: Option<String>,
    /// 🔒 Password. "password123" is not a password. It is a confession.
    #[serde(default)]
    pub password: Option<String>,
    /// 🔒 API key, the velvet rope variant of authentication. Wins over basic auth.
    #[serde(default)]
    pub api_key: Option<String>,
    /// ⏱️ How long to wait for a TCP handshake.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// ⏱️ How long to wait for any single request, start to finish.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_cluster_name() -> String {
    "elasticsearch".to_string()
}

fn default_static_index_name() -> String {
    "flume".to_string()
}

fn default_index_type() -> String {
    "log".to_string()
}

fn default_discovery_seed() -> String {
    "http://localhost:9200".to_string()
}

// -- ⏱️ 10s to shake hands, 30s to finish talking. polite, not patient.
fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ElasticsearchSinkConfig {
    fn default() -> Self {
        Self {
            cluster_name: default_cluster_name(),
            static_index_name: default_static_index_name(),
            index_type: default_index_type(),
            index_pattern: None,
            host_list: Vec::new(),
            charset: Charset::default(),
            local_only: false,
            discovery_seed: default_discovery_seed(),
            username: None,
            password: None,
            api_key: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn deserialize_host_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum HostList {
        Joined(String),
        Listed(Vec<String>),
    }

    let the_hosts = match HostList::deserialize(deserializer)? {
        HostList::Joined(joined) => joined.split(',').map(str::to_string).collect(),
        HostList::Listed(listed) => listed,
    };
    Ok(the_hosts
        .into_iter()
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .collect())
}

// ============================================================
//  📊 Metrics
// ============================================================

/// 📊 What the host can pull out of the sink at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SinkMetrics {
    /// 💀 Events dropped because they couldn't be transcoded, resolved or written.
    pub failed_event_count: u64,
    /// ✅ Events whose document write succeeded.
    pub indexed_event_count: u64,
}

// ============================================================
//  🕳️ EventSink
// ============================================================

/// 🕳️ The lifecycle a host drives: `start` once, `on_event` many times, `stop` once.
#[async_trait]
pub trait EventSink {
    /// 🔌 Connect to wherever the events are going.
    async fn start(&mut self) -> Result<()>;
    /// 📥 Handle one event. Never fails outward.
    async fn on_event(&self, event: &Event);
    /// 🗑️ Disconnect.
    async fn stop(&mut self) -> Result<()>;
    /// 📊 A snapshot of the counters.
    fn read_metrics(&self) -> SinkMetrics;
}

/// 📡 The sink that turns events into Elasticsearch documents.
#[derive(Debug)]
pub struct ElasticsearchSink {
    config: ElasticsearchSinkConfig,
    resolver: IndexResolver,
    dispatcher: Dispatcher,
    /// 🔌 The live connection, present between `start` and `stop`.
    store: Option<StoreBackend>,
    /// 📦 A store handed in by the host, used by the next `start` instead of dialing out.
    pending_store: Option<StoreBackend>,
    failed_events: AtomicU64,
    indexed_events: AtomicU64,
}

impl ElasticsearchSink {
    /// 🏗️ Validate `config` and build an unstarted sink. Counters start at zero.
    pub fn new(config: ElasticsearchSinkConfig) -> Result<Self> {
        let resolver =
            IndexResolver::new(config.static_index_name.clone(), config.index_pattern.as_deref())
                .context("💀 The sink's index settings don't add up")?;
        let dispatcher = Dispatcher::new(config.index_type.clone());
        debug!(
            "🏗️ Sink ready: index '{}', pattern {:?}, type '{}', charset {}",
            resolver.static_index_name(),
            resolver.pattern(),
            dispatcher.index_type(),
            config.charset.name()
        );

        Ok(Self {
            config,
            resolver,
            dispatcher,
            store: None,
            pending_store: None,
            failed_events: AtomicU64::new(0),
            indexed_events: AtomicU64::new(0),
        })
    }

    /// 📦 Use `store` on the next `start()` instead of connecting through the config.
    pub fn with_store(mut self, store: StoreBackend) -> Self {
        self.pending_store = Some(store);
        self
    }

    pub fn config(&self) -> &ElasticsearchSinkConfig {
        &self.config
    }

    /// 🔄 The whole pipeline for one event. Any `Err` here costs the event.
    async fn forward(&self, event: &Event) -> Result<(), ForwardError> {
        let store = self.store.as_ref().ok_or(ForwardError::NotStarted)?;
        let the_document = document::build(event, self.config.charset)?;
        let the_target = self.resolver.resolve(event)?;
        self.dispatcher
            .submit(store, &the_document, &the_target)
            .await
    }
}

#[async_trait]
impl EventSink for ElasticsearchSink {
    async fn start(&mut self) -> Result<()> {
        anyhow::ensure!(
            self.store.is_none(),
            "💀 The sink is already started. Starting it twice won't make it twice as fast."
        );
        let the_store = match self.pending_store.take() {
            Some(store) => store,
            None => backends::connect(&self.config)
                .await
                .context("💀 The sink could not connect to its store")?,
        };
        self.store = Some(the_store);
        info!("🚀 Sink started, indexing into '{}'", self.resolver.static_index_name());
        Ok(())
    }

    async fn on_event(&self, event: &Event) {
        match self.forward(event).await {
            Ok(()) => {
                self.indexed_events.fetch_add(1, Ordering::SeqCst);
                trace!("✅ Event from '{}' indexed", event.host);
            }
            Err(err) => {
                self.failed_events.fetch_add(1, Ordering::SeqCst);
                error!(
                    host = %event.host,
                    priority = %event.priority,
                    timestamp = event.timestamp_millis(),
                    body = %String::from_utf8_lossy(&event.body),
                    "💀 Dropped an event: {:#}",
                    anyhow::Error::from(err)
                );
            }
        }
    }

    async fn stop(&mut self) -> Result<()> {
        let Some(mut the_store) = self.store.take() else {
            warn!("⚠️ stop() on a sink that isn't started. Nothing to close.");
            return Ok(());
        };
        the_store
            .close()
            .await
            .context("💀 The store did not close cleanly")?;
        let the_metrics = self.read_metrics();
        info!(
            "🏁 Sink stopped: {} indexed, {} failed",
            the_metrics.indexed_event_count, the_metrics.failed_event_count
        );
        Ok(())
    }

    fn read_metrics(&self) -> SinkMetrics {
        SinkMetrics {
            failed_event_count: self.failed_events.load(Ordering::SeqCst),
            indexed_event_count: self.indexed_events.load(Ordering::SeqCst),
        }
    }
}
