// ai
//! 💀 Errors: the taxonomy of things that go wrong between a log line and an index.
//!
//! 🎬 *[a single malformed `{` walks into the pipeline. the pipeline does not walk it back out.]*
//!
//! Everything at the I/O seams (store backends, config, sources) speaks `anyhow`, same as
//! the rest of lgx. The per-event pipeline gets a named enum instead, so a dropped event
//! can say exactly which step dropped it.
//!
//! 🧠 Knowledge graph:
//! - `Transcode` / `InvalidTimestamp` / `IndexPattern` / `EmptyIndexName`: the event could
//!   not become a document with a destination. Counted.
//! - `Submission`: the document could not become an indexed document. Counted.
//! - `Alias`: the document IS indexed, the alias just didn't stick. The dispatcher logs it
//!   and keeps going, so it never reaches the sink's counters.
//! - `NotStarted`: the sink got an event with no store attached. Counted. 🦆

use thiserror::Error;

/// 💀 Everything the per-event pipeline can fail with.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// 🔬 The field said "I'm JSON" with its first byte and then lied with every byte after.
    #[error("field '{field}' looks like structured content but does not parse: {source}")]
    Transcode {
        field: String,
        #[source]
        source: serde_json::Error,
    },

    /// 🕰️ A timestamp so far from 1970 that chrono politely declined to own it.
    #[error("timestamp {millis}ms is outside the representable calendar range")]
    InvalidTimestamp { millis: i64 },

    /// 🗓️ chrono refused to render a validated pattern. Should not happen. Counted if it does.
    #[error("index pattern '{pattern}' could not be expanded")]
    IndexPattern { pattern: String },

    /// 🕳️ Every `%{attr}` in the pattern came up empty and nothing else was left.
    #[error("index pattern '{pattern}' resolved to an empty index name")]
    EmptyIndexName { pattern: String },

    /// 📡 The store refused the write, or never heard it.
    #[error("failed to write document into index '{index}'")]
    Submission {
        index: String,
        #[source]
        source: anyhow::Error,
    },

    /// 🏷️ The write landed, the alias didn't.
    #[error("failed to register alias '{alias}' over index '{index}'")]
    Alias {
        index: String,
        alias: String,
        #[source]
        source: anyhow::Error,
    },

    /// 🔌 No store handle. Either `start()` never ran or `stop()` already did.
    #[error("sink is not started, no store connection to write through")]
    NotStarted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_every_error_names_its_culprit() {
        let the_bad_json = serde_json::from_str::<serde_json::Value>("{ nope").unwrap_err();
        let the_transcode = ForwardError::Transcode {
            field: "message".to_string(),
            source: the_bad_json,
        };
        let the_alias = ForwardError::Alias {
            index: "logs-1970.01.01".to_string(),
            alias: "logs".to_string(),
            source: anyhow::anyhow!("cluster said no"),
        };
        let the_empty = ForwardError::EmptyIndexName {
            pattern: "%{service}".to_string(),
        };

        assert!(the_transcode.to_string().contains("'message'"));
        assert!(the_alias.to_string().contains("'logs'"));
        assert!(the_alias.to_string().contains("'logs-1970.01.01'"));
        assert!(the_empty.to_string().contains("'%{service}'"));
        assert!(ForwardError::InvalidTimestamp { millis: i64::MAX }
            .to_string()
            .contains(&i64::MAX.to_string()));

        // 🔗 the store's own complaint rides along as the source, for `{:#}` to print
        let the_chain = format!("{:#}", anyhow::Error::from(the_alias));
        assert!(the_chain.contains("cluster said no"));
    }
}
