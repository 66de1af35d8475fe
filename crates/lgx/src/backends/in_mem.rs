//! # Previously, on lgx...
//!
//! 🎬 The cluster was down. Or far away. Or it was a unit test and nobody wanted a cluster
//! anyway. Someone had to pretend to be Elasticsearch. Someone had to keep the documents,
//! keep the aliases, and answer "how many are behind `flume`?" without ever opening a socket.
//!
//! That someone was this module.
//!
//! [`InMemoryStore`] is the `local_only` store. It files documents per index, keeps a map of
//! aliases, and lets callers search by index or alias name. It also copies the real cluster's
//! opinions: a blank name is no name at all, an alias can't share a name with an index, and an
//! alias can't point at an index that doesn't exist.
//!
//! 🔒 State lives behind `Arc<Mutex<...>>`, so clones share it. Hand one clone to the sink, keep
//! the other for assertions. Trust issues, resolved.
//!
//! ⚠️ Not durable. When the process exits, so do the documents. 🦆

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::backends::SearchStore;
use crate::document::Document;

/// 📄 A document as the in-memory store remembers it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub index: String,
    pub doc_type: String,
    pub source: Value,
}

#[derive(Debug, Default)]
struct InMemoryState {
    indices: BTreeMap<String, Vec<StoredDocument>>,
    aliases: BTreeMap<String, BTreeSet<String>>,
    reject_writes: bool,
    reject_aliases: bool,
}

/// 🏠 An in-process stand-in for a cluster. Clones share the same state.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryStore {
    /// 🚀 A fresh, empty store. The most hopeful a `BTreeMap` will ever be.
    pub fn new() -> Self {
        Self::default()
    }

    /// 💣 Make every following write fail, like a cluster with a full disk.
    pub async fn reject_writes(&self, reject: bool) {
        self.state.lock().await.reject_writes = reject;
    }

    /// 💣 Make every following alias registration fail.
    pub async fn reject_aliases(&self, reject: bool) {
        self.state.lock().await.reject_aliases = reject;
    }

    /// 🔍 Every document reachable under `name`: the index itself, or every index behind
    /// the alias. Unknown names find nothing, not an error.
    pub async fn search(&self, name: &str) -> Vec<StoredDocument> {
        let state = self.state.lock().await;
        if let Some(docs) = state.indices.get(name) {
            return docs.clone();
        }
        state
            .aliases
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|index| state.indices.get(index))
            .flatten()
            .cloned()
            .collect()
    }

    /// 📋 Names of every index that has received at least one document.
    pub async fn index_names(&self) -> Vec<String> {
        self.state.lock().await.indices.keys().cloned().collect()
    }

    /// 🏷️ The indices `alias` currently points at.
    pub async fn alias_targets(&self, alias: &str) -> Vec<String> {
        self.state
            .lock()
            .await
            .aliases
            .get(alias)
            .map(|targets| targets.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SearchStore for InMemoryStore {
    async fn write(&self, index: &str, doc_type: &str, document: &Document) -> Result<()> {
        let source = serde_json::to_value(document)?;
        let mut state = self.state.lock().await;
        anyhow::ensure!(!state.reject_writes, "💀 in-memory store is rejecting writes");
        anyhow::ensure!(!index.trim().is_empty(), "💀 invalid_index_name: an index needs a name");
        anyhow::ensure!(
            !state.aliases.contains_key(index),
            "💀 '{}' is an alias, not an index. Writing through it is not something we pretend to support.",
            index
        );

        state
            .indices
            .entry(index.to_string())
            .or_default()
            .push(StoredDocument {
                index: index.to_string(),
                doc_type: doc_type.to_string(),
                source,
            });
        trace!("📥 Stored a document in '{}'", index);
        Ok(())
    }

    async fn add_alias(&self, index: &str, alias: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        anyhow::ensure!(!state.reject_aliases, "💀 in-memory store is rejecting aliases");
        anyhow::ensure!(
            !index.trim().is_empty() && !alias.trim().is_empty(),
            "💀 invalid_alias_name: '{}' -> '{}' is missing a name on one side",
            alias,
            index
        );
        anyhow::ensure!(
            state.indices.contains_key(index),
            "💀 index_not_found: '{}' does not exist, so it cannot be aliased",
            index
        );
        anyhow::ensure!(
            !state.indices.contains_key(alias),
            "💀 an index named '{}' already exists, an alias cannot take its name",
            alias
        );

        // -- 🔁 BTreeSet::insert on an existing member is a no-op. idempotence for free.
        state
            .aliases
            .entry(alias.to_string())
            .or_default()
            .insert(index.to_string());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        debug!("🗑️ In-memory store closing. The documents stay, for whoever still holds a clone.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Event, Priority};
    use crate::document;
    use crate::transcode::Charset;

    fn the_document(body: &str) -> Document {
        document::build(&Event::new(body, 0, Priority::Warn, "notlocalhost"), Charset::Utf8)
            .expect("document builds")
    }

    #[tokio::test]
    async fn the_one_where_aliases_gather_their_indices() -> Result<()> {
        let the_store = InMemoryStore::new();
        the_store.write("test_1970-01-01", "log", &the_document("one")).await?;
        the_store.write("test_1970-01-02", "log", &the_document("two")).await?;
        the_store.add_alias("test_1970-01-01", "flume").await?;
        the_store.add_alias("test_1970-01-02", "flume").await?;

        assert_eq!(the_store.search("test_1970-01-01").await.len(), 1);
        assert_eq!(the_store.search("test_1970-01-02").await.len(), 1);
        assert_eq!(the_store.search("flume").await.len(), 2);
        assert!(the_store.search("nope").await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_saying_it_twice_changes_nothing() -> Result<()> {
        let the_store = InMemoryStore::new();
        the_store.write("logs-a", "log", &the_document("x")).await?;
        the_store.add_alias("logs-a", "logs").await?;
        the_store.add_alias("logs-a", "logs").await?;

        assert_eq!(the_store.alias_targets("logs").await, vec!["logs-a".to_string()]);
        assert_eq!(the_store.search("logs").await.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_names_are_not_shared() -> Result<()> {
        let the_store = InMemoryStore::new();
        the_store.write("flume", "log", &the_document("x")).await?;
        the_store.write("flume-2", "log", &the_document("y")).await?;

        // 🚫 an alias can't steal an index's name, or alias a ghost
        assert!(the_store.add_alias("flume-2", "flume").await.is_err());
        assert!(the_store.add_alias("ghost", "spooky").await.is_err());

        the_store.add_alias("flume-2", "everything").await?;
        assert!(the_store.write("everything", "log", &the_document("z")).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_nameless_index_is_turned_away() -> Result<()> {
        let the_store = InMemoryStore::new();
        assert!(the_store.write("", "log", &the_document("x")).await.is_err());
        assert!(the_store.write("   ", "log", &the_document("x")).await.is_err());
        assert!(the_store.index_names().await.is_empty());

        the_store.write("flume-1", "log", &the_document("x")).await?;
        assert!(the_store.add_alias("flume-1", "").await.is_err());
        assert!(the_store.add_alias("", "flume").await.is_err());
        assert!(the_store.alias_targets("").await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_store_can_be_told_to_have_a_bad_day() -> Result<()> {
        let the_store = InMemoryStore::new();
        the_store.reject_writes(true).await;
        assert!(the_store.write("flume", "log", &the_document("x")).await.is_err());
        assert!(the_store.index_names().await.is_empty());

        the_store.reject_writes(false).await;
        the_store.reject_aliases(true).await;
        the_store.write("flume-1", "log", &the_document("x")).await?;
        assert!(the_store.add_alias("flume-1", "flume").await.is_err());
        assert_eq!(the_store.index_names().await, vec!["flume-1".to_string()]);
        Ok(())
    }
}
