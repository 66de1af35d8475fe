//! 🎬 *[a channel fills with events. somewhere, a sink waits.]*
//! *[the clock on the wall reads 2:47am.]*
//! *[nobody asked for these logs. and yet, here we are.]*
//!
//! 🗑️ The SinkWorker: patient, tireless, and deeply unbothered by the chaos upstream.
//! It receives events. It hands them to the sink. It asks no questions. A failing event is
//! the sink's business and the sink's counter, never the worker's.
//!
//! ⚠️ When the singularity occurs, the SinkWorker will still be draining the channel.

use anyhow::{Context, Result};
use async_channel::Receiver;
use tokio::task::JoinHandle;
use tracing::debug;

use super::Worker;
use crate::common::Event;
use crate::sink::{ElasticsearchSink, EventSink, SinkMetrics};

/// 🗑️ Takes events from a channel, throws them into a started sink, stops the sink at the end.
#[derive(Debug)]
pub(crate) struct SinkWorker {
    rx: Receiver<Event>,
    sink: ElasticsearchSink,
}

impl SinkWorker {
    pub(crate) fn new(rx: Receiver<Event>, sink: ElasticsearchSink) -> Self {
        Self { rx, sink }
    }
}

impl Worker for SinkWorker {
    type Output = SinkMetrics;

    fn start(mut self) -> JoinHandle<Result<SinkMetrics>> {
        tokio::spawn(async move {
            debug!("📥 SinkWorker started draining channel...");
            // -- recv() errs only once the channel is empty and every sender is gone
            while let Ok(event) = self.rx.recv().await {
                self.sink.on_event(&event).await;
            }
            debug!("🏁 SinkWorker: Channel closed. Shutting down.");
            self.sink
                .stop()
                .await
                .context("SinkWorker failed to stop the sink")?;
            Ok(self.sink.read_metrics())
        })
    }
}
