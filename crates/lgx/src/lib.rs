// ai
//! 🪵 lgx: log events in, Elasticsearch documents out.
//!
//! 🧠 Knowledge graph:
//! - [`common`]: the event as the host agent hands it over.
//! - [`transcode`] → [`document`] → [`index_resolver`] → [`dispatcher`]: the pipeline, one
//!   event at a time.
//! - [`sink`]: the facade hosts drive (`start`, `on_event`, `stop`, `read_metrics`).
//! - [`backends`]: where documents land. A real cluster, or an in-process stand-in.
//! - [`sources`] + the supervisor: the host side shipped with this crate, reading event
//!   records from a file or stdin.
//! - [`app_config`]: Figment-loaded configuration for all of the above.

pub mod app_config;
pub mod backends;
pub mod common;
pub mod dispatcher;
pub mod document;
pub mod error;
pub mod index_resolver;
pub mod sink;
pub mod sources;
mod supervisors;
pub mod transcode;

use anyhow::Result;

pub use crate::app_config::{AppConfig, RuntimeConfig, load_config};
pub use crate::common::{EpochTimestamp, Event, Priority};
pub use crate::error::ForwardError;
pub use crate::sink::{ElasticsearchSink, ElasticsearchSinkConfig, EventSink, SinkMetrics};
pub use crate::supervisors::RunReport;

/// 🚀 Forward every event the configured source produces into the configured sink.
pub async fn run(app_config: AppConfig) -> Result<RunReport> {
    supervisors::Supervisor::new(app_config).run().await
}
