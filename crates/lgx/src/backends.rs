//! 🔌 Backends: where the documents actually leave the building.
//!
//! 🚰 The pipeline builds documents. The store swallows them. This module is the throat.
//!
//! 🎭 Two stores in the casting call:
//! - [`ElasticsearchStore`]: a real cluster, over HTTP, with timeouts and feelings.
//! - [`InMemoryStore`]: an in-process stand-in (`local_only = true`), for tests and dry runs.
//!   Same contract. No network. No heartbeat. No mortgage on the line.
//!
//! The [`StoreBackend`] enum dispatches to whichever one the config picked, so the sink
//! never needs to know whether its documents are going to a cluster or to a `Vec`.
//! Ancient proverb: "He who hardcodes the backend, tests against production."
//!
//! 🦆 The duck is here because every file must have one. This is law. Do not question the duck.

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::document::Document;
use crate::sink::ElasticsearchSinkConfig;

pub mod elasticsearch;
pub mod in_mem;

pub use elasticsearch::ElasticsearchStore;
pub use in_mem::{InMemoryStore, StoredDocument};

/// 🗄️ The search-store client boundary: write a document, hang an alias, hang up.
///
/// # Contract
/// - `write` is one attempt. No retries. The store picks the document id.
/// - `add_alias` is idempotent. Registering the same alias twice is a shrug, not an error.
/// - `close` releases whatever the connection holds. Call it once, at the end.
#[async_trait]
pub trait SearchStore: std::fmt::Debug {
    /// 📡 Index `document` into `index` under `doc_type`.
    async fn write(&self, index: &str, doc_type: &str, document: &Document) -> Result<()>;
    /// 🏷️ Make `alias` resolve to (among others) `index`.
    async fn add_alias(&self, index: &str, alias: &str) -> Result<()>;
    /// 🗑️ Say goodbye.
    async fn close(&mut self) -> Result<()>;
}

/// 🎭 The many faces of a store. Enum dispatch, no vtables, no surprises.
#[derive(Debug)]
pub enum StoreBackend {
    InMemory(InMemoryStore),
    Elasticsearch(ElasticsearchStore),
}

#[async_trait]
impl SearchStore for StoreBackend {
    async fn write(&self, index: &str, doc_type: &str, document: &Document) -> Result<()> {
        match self {
            StoreBackend::InMemory(store) => store.write(index, doc_type, document).await,
            StoreBackend::Elasticsearch(store) => store.write(index, doc_type, document).await,
        }
    }

    async fn add_alias(&self, index: &str, alias: &str) -> Result<()> {
        match self {
            StoreBackend::InMemory(store) => store.add_alias(index, alias).await,
            StoreBackend::Elasticsearch(store) => store.add_alias(index, alias).await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            StoreBackend::InMemory(store) => store.close().await,
            StoreBackend::Elasticsearch(store) => store.close().await,
        }
    }
}

/// 🔌 Open a store connection according to `config`.
///
/// `local_only` wins over everything else and hands back a fresh in-memory store.
/// Otherwise we dial the cluster: explicit `host_list`, or auto-discovery when it's empty.
pub async fn connect(config: &ElasticsearchSinkConfig) -> Result<StoreBackend> {
    if config.local_only {
        info!("🏠 local_only is set, indexing into an in-process store. Nothing leaves this process.");
        return Ok(StoreBackend::InMemory(InMemoryStore::new()));
    }
    Ok(StoreBackend::Elasticsearch(
        ElasticsearchStore::connect(config).await?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn the_one_where_local_only_never_touches_the_network() -> Result<()> {
        let the_config = ElasticsearchSinkConfig {
            local_only: true,
            // -- 🚫 nothing listens here, and nothing needs to
            host_list: vec!["http://127.0.0.1:1".to_string()],
            ..ElasticsearchSinkConfig::default()
        };
        let the_store = connect(&the_config).await?;
        assert!(matches!(the_store, StoreBackend::InMemory(_)));
        Ok(())
    }
}
