//! 🚰 The SourceWorker: a faucet with a counter. It pulls events out of the source and
//! pushes them into the queue until the source says "that's all, folks".
//!
//! When it returns, its sender is dropped, and that is how the SinkWorker learns the show is over.

use anyhow::{Context, Result};
use async_channel::Sender;
use tokio::task::JoinHandle;
use tracing::debug;

use super::Worker;
use crate::common::Event;
use crate::sources::{EventSource, SourceBackend};

/// 📊 What the source side has to say for itself.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SourceReport {
    pub(crate) events_read: u64,
    pub(crate) skipped_records: u64,
}

#[derive(Debug)]
pub(crate) struct SourceWorker {
    tx: Sender<Event>,
    source: SourceBackend,
}

impl SourceWorker {
    pub(crate) fn new(tx: Sender<Event>, source: SourceBackend) -> Self {
        Self { tx, source }
    }
}

impl Worker for SourceWorker {
    type Output = SourceReport;

    fn start(mut self) -> JoinHandle<Result<SourceReport>> {
        tokio::spawn(async move {
            debug!("📤 SourceWorker started pumping events...");
            let mut events_read = 0u64;
            while let Some(event) = self.source.next_event().await? {
                self.tx
                    .send(event)
                    .await
                    .context("💀 SourceWorker lost the queue, the sink side is gone")?;
                events_read += 1;
            }
            debug!("🏁 SourceWorker: source exhausted after {} events", events_read);
            Ok(SourceReport {
                events_read,
                skipped_records: self.source.skipped_records(),
            })
        })
    }
}
