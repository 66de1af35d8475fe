use std::collections::VecDeque;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crate::common::Event;

pub mod ndjson;

pub use ndjson::{EventRecord, NdjsonSource, TimestampUnit};

/// 🚰 A source that produces one event per call.
///
/// # Contract 📜
/// - `Ok(Some(event))` while events flow.
/// - `Ok(None)` = EOF. The well is dry. The golden retriever goes home. 🐕
/// - `Err(...)` only when the underlying reader breaks. A record that doesn't parse is
///   not an error, it's a statistic: see `skipped_records`.
/// - `&mut self` because sources have state. And feelings. Mostly state.
#[async_trait]
pub trait EventSource: std::fmt::Debug {
    /// 📄 Fetch the next event.
    async fn next_event(&mut self) -> Result<Option<Event>>;
    /// 🗑️ How many records were read but thrown away because they made no sense.
    fn skipped_records(&self) -> u64;
}

/// 📂 Read event records from a file, one JSON object per line.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct FileSourceConfig {
    pub file_name: String,
}

/// 🎛️ Where events come from. `[source_config.File]` with a `file_name`, or `"Stdin"`.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub enum SourceConfig {
    File(FileSourceConfig),
    #[default]
    Stdin,
}

/// 🎭 The many faces of a Source. The enum dispatches so callers never need to care
/// whether the events come from disk, a pipe, or a `Vec` someone built in a test.
#[derive(Debug)]
pub enum SourceBackend {
    Ndjson(NdjsonSource),
    InMemory(InMemorySource),
}

impl SourceBackend {
    /// 🔌 Open whatever `config` points at.
    pub async fn open(config: &SourceConfig) -> Result<Self> {
        let the_source = match config {
            SourceConfig::File(file_config) => NdjsonSource::open_file(&file_config.file_name).await?,
            SourceConfig::Stdin => NdjsonSource::stdin(),
        };
        Ok(SourceBackend::Ndjson(the_source))
    }
}

#[async_trait]
impl EventSource for SourceBackend {
    async fn next_event(&mut self) -> Result<Option<Event>> {
        match self {
            SourceBackend::Ndjson(source) => source.next_event().await,
            SourceBackend::InMemory(source) => source.next_event().await,
        }
    }

    fn skipped_records(&self) -> u64 {
        match self {
            SourceBackend::Ndjson(source) => source.skipped_records(),
            SourceBackend::InMemory(source) => source.skipped_records(),
        }
    }
}

/// 🧠 Events that already exist in memory, handed out in order.
#[derive(Debug, Default)]
pub struct InMemorySource {
    events: VecDeque<Event>,
}

impl InMemorySource {
    pub fn new(events: impl IntoIterator<Item = Event>) -> Self {
        Self {
            events: events.into_iter().collect(),
        }
    }
}

#[async_trait]
impl EventSource for InMemorySource {
    async fn next_event(&mut self) -> Result<Option<Event>> {
        Ok(self.events.pop_front())
    }

    fn skipped_records(&self) -> u64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Priority;

    #[tokio::test]
    async fn the_one_where_the_in_memory_source_hands_out_events_in_order() -> Result<()> {
        let mut the_source = SourceBackend::InMemory(InMemorySource::new(vec![
            Event::new("first", 0, Priority::Info, "h"),
            Event::new("second", 1, Priority::Info, "h"),
        ]));

        assert_eq!(the_source.next_event().await?.map(|e| e.body), Some(b"first".to_vec()));
        assert_eq!(the_source.next_event().await?.map(|e| e.body), Some(b"second".to_vec()));
        assert!(the_source.next_event().await?.is_none());
        assert_eq!(the_source.skipped_records(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_missing_file_says_which_file() {
        let the_err = SourceBackend::open(&SourceConfig::File(FileSourceConfig {
            file_name: "/definitely/not/here.ndjson".to_string(),
        }))
        .await
        .expect_err("missing file must not open");
        assert!(format!("{:#}", the_err).contains("/definitely/not/here.ndjson"));
    }

    #[test]
    fn the_one_where_the_source_defaults_to_stdin() {
        assert_eq!(SourceConfig::default(), SourceConfig::Stdin);
    }
}
