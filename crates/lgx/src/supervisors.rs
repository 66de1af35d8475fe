//! 🎬 *[camera pans across a dimly lit server room]*
//! 🎬 *[dramatic orchestral music swells]*
//! 🎬 "In a world where log lines arrive endlessly..."
//! 🎬 "One supervisor dared to forward them all."
//! 🎬 *[record scratch]* 🦆
//!
//! 📦 The Supervisor module: the host side of the sink. It opens the source, starts the
//! sink, wires them together with a bounded queue, and waits for both to finish.
//!
//! ⚠️ The workers are private. Like Fight Club, but for async tasks.
//! First rule: you don't pub the workers.

mod workers;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::app_config::AppConfig;
use crate::backends::StoreBackend;
use crate::sink::{ElasticsearchSink, EventSink, SinkMetrics};
use crate::sources::SourceBackend;
use workers::{SinkWorker, SourceWorker, Worker};

/// 📊 What a run leaves behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RunReport {
    /// The sink's counters at the moment it stopped.
    pub metrics: SinkMetrics,
    /// Events the source produced and the sink received.
    pub events_read: u64,
    /// Input records that never became events.
    pub skipped_records: u64,
}

/// 📦 The Supervisor: because even async tasks need someone hovering over them
/// asking "is it done yet?" every 5 milliseconds.
pub(crate) struct Supervisor {
    app_config: AppConfig,
    source: Option<SourceBackend>,
    store: Option<StoreBackend>,
}

impl Supervisor {
    pub(crate) fn new(app_config: AppConfig) -> Self {
        Self {
            app_config,
            source: None,
            store: None,
        }
    }

    /// 🧪 Read from `source` instead of opening the configured one.
    #[cfg(test)]
    pub(crate) fn with_source(mut self, source: SourceBackend) -> Self {
        self.source = Some(source);
        self
    }

    /// 🧪 Write into `store` instead of connecting to the configured one.
    #[cfg(test)]
    pub(crate) fn with_store(mut self, store: StoreBackend) -> Self {
        self.store = Some(store);
        self
    }

    /// 🧵 Connect, forward until the source runs dry, disconnect, report.
    pub(crate) async fn run(self) -> Result<RunReport> {
        let Supervisor {
            app_config,
            source,
            store,
        } = self;

        let the_source = match source {
            Some(source) => source,
            None => SourceBackend::open(&app_config.source_config).await?,
        };

        let mut the_sink = ElasticsearchSink::new(app_config.sink_config.clone())?;
        if let Some(store) = store {
            the_sink = the_sink.with_store(store);
        }
        the_sink.start().await?;

        let (tx, rx) = async_channel::bounded(app_config.runtime.queue_capacity.max(1));
        info!(
            "🚀 Forwarding with a queue of {} events",
            app_config.runtime.queue_capacity.max(1)
        );

        let source_handle = SourceWorker::new(tx, the_source).start();
        let sink_handle = SinkWorker::new(rx, the_sink).start();
        let (source_joined, sink_joined) = futures::future::join(source_handle, sink_handle).await;

        let the_metrics = sink_joined.context("💀 The sink worker panicked")??;
        let the_source_report = source_joined.context("💀 The source worker panicked")??;

        Ok(RunReport {
            metrics: the_metrics,
            events_read: the_source_report.events_read,
            skipped_records: the_source_report.skipped_records,
        })
    }
}
