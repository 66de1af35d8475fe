// ai
//! 📦 Common data structures: the building blocks of lgx
//!
//! ---
//!
//! 🎬 COLD OPEN: INT. LOG AGGREGATOR: 3:47 AM
//!
//! A service somewhere has just said "connection reset by peer" for the nine hundredth
//! time tonight. The collection agent scoops the line up, stamps it with a host and a
//! priority, staples a few attributes to it, and hands it over. It arrives here as an
//! [`Event`]. It does not know it is about to become a document. Nobody told it.
//!
//! 🦆
//!
//! These types are owned by whoever produced the event. The pipeline only reads them.
//! Look, don't touch. Like a museum. A museum of `Vec<u8>`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// 🚨 How loud the log line is yelling.
///
/// The full ladder the collection agent knows about, from "the building is on fire"
/// down to "I entered a function, thought you'd like to know".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Fatal,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Priority {
    /// 🏷️ The name that goes into the document's `priority` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Fatal => "FATAL",
            Priority::Error => "ERROR",
            Priority::Warn => "WARN",
            Priority::Info => "INFO",
            Priority::Debug => "DEBUG",
            Priority::Trace => "TRACE",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 🕰️ An epoch timestamp that remembers which unit it was born in.
///
/// Agents disagree on whether "now" is measured in milliseconds or nanoseconds.
/// Documents do not get a vote: they always get milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochTimestamp {
    Millis(i64),
    Nanos(i64),
}

impl EpochTimestamp {
    /// 📏 Normalize to epoch milliseconds. Nanos floor toward negative infinity, so
    /// one nanosecond before 1970 is still 1969. Time is like that.
    pub fn as_millis(self) -> i64 {
        match self {
            EpochTimestamp::Millis(millis) => millis,
            EpochTimestamp::Nanos(nanos) => nanos.div_euclid(1_000_000),
        }
    }
}

/// 🪵 One unit of log data arriving at the sink.
///
/// `body` and every attribute value are raw bytes. Any of them may secretly be JSON.
/// Any of them may secretly be Latin-1. The transcoder will find out.
///
/// `attributes` is a `BTreeMap` so the rendered `fields` object comes out in the same
/// order every time. The order means nothing. Determinism means a lot, mostly to tests.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub body: Vec<u8>,
    pub timestamp: EpochTimestamp,
    pub host: String,
    pub priority: Priority,
    pub attributes: BTreeMap<String, Vec<u8>>,
}

impl Event {
    /// 🏗️ An event with a millisecond timestamp and no attributes. Attach those with
    /// [`Event::with_attribute`], one sticky note at a time.
    pub fn new(
        body: impl Into<Vec<u8>>,
        timestamp_millis: i64,
        priority: Priority,
        host: impl Into<String>,
    ) -> Self {
        Self {
            body: body.into(),
            timestamp: EpochTimestamp::Millis(timestamp_millis),
            host: host.into(),
            priority,
            attributes: BTreeMap::new(),
        }
    }

    /// 📎 Staple an attribute onto the event. Same key twice? Last one wins.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// 🕰️ The event time in epoch milliseconds, whatever unit it arrived in.
    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.as_millis()
    }
}
