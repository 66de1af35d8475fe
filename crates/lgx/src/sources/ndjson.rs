// ai
//! 📂 Previously, on "Things That Could Go Wrong With A Line"...
//!
//! The pipe was quiet. Too quiet. Then a line arrived: `{"body": "disk full", "priority": "ERROR"}`.
//! Then another. Then one that said `{"body": "oops` and simply stopped, mid-thought,
//! like a developer who just noticed it was Friday at 4:59pm.
//!
//! This module turns newline-delimited JSON event records into [`Event`]s. Each line is one
//! record. Blank lines are skipped without comment. Lines that won't parse are logged, counted
//! and skipped, because one bad line should never take the rest of the file down with it.
//!
//! 🚰 reader → BufReader → bytes per line → EventRecord → Event
//! 🦆 (mandatory, no notes)

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::Deserialize;
use serde_json::Value;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, trace, warn};

use crate::common::{EpochTimestamp, Event, Priority};
use crate::sources::EventSource;

/// ⏱️ What unit a record's `timestamp` is counted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampUnit {
    #[default]
    Millis,
    Nanos,
}

/// 📄 One line of input, as written by whoever feeds us.
///
/// `body` and attribute values may be strings (used as their bytes) or any other JSON value
/// (serialized back to compact JSON text, which the transcoder will then happily parse again).
///
/// JSON strings are always UTF-8, so bytes in any other charset travel base64-encoded in
/// `body_base64` / `attributes_base64`. Those are decoded verbatim and win over the plain forms.
#[derive(Debug, Clone, Deserialize)]
pub struct EventRecord {
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub body_base64: Option<String>,
    /// None means "now".
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub timestamp_unit: TimestampUnit,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_priority")]
    pub priority: Priority,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
    #[serde(default)]
    pub attributes_base64: BTreeMap<String, String>,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_priority() -> Priority {
    Priority::Info
}

fn value_bytes(value: Value) -> Vec<u8> {
    match value {
        Value::Null => Vec::new(),
        Value::String(text) => text.into_bytes(),
        other => other.to_string().into_bytes(),
    }
}

impl EventRecord {
    /// 🔄 Turn the record into an event, stamping it with `now_millis` if it has no timestamp.
    ///
    /// 💀 Fails only when a `*_base64` field is not valid base64.
    pub fn into_event(self, now_millis: i64) -> Result<Event> {
        let timestamp = match (self.timestamp, self.timestamp_unit) {
            (Some(nanos), TimestampUnit::Nanos) => EpochTimestamp::Nanos(nanos),
            (Some(millis), TimestampUnit::Millis) => EpochTimestamp::Millis(millis),
            (None, _) => EpochTimestamp::Millis(now_millis),
        };
        let body = match self.body_base64 {
            Some(encoded) => STANDARD
                .decode(encoded.trim())
                .context("💀 body_base64 is not base64")?,
            None => value_bytes(self.body),
        };

        let mut attributes: BTreeMap<String, Vec<u8>> = self
            .attributes
            .into_iter()
            .map(|(key, value)| (key, value_bytes(value)))
            .collect();
        for (key, encoded) in self.attributes_base64 {
            let the_raw = STANDARD
                .decode(encoded.trim())
                .with_context(|| format!("💀 attributes_base64.{} is not base64", key))?;
            attributes.insert(key, the_raw);
        }

        Ok(Event {
            body,
            timestamp,
            host: self.host,
            priority: self.priority,
            attributes,
        })
    }
}

/// 📂 Reads event records line by line from anything async-readable.
pub struct NdjsonSource {
    name: String,
    reader: BufReader<Box<dyn AsyncRead + Send + Unpin>>,
    line: Vec<u8>,
    line_number: u64,
    skipped: u64,
}

// 🐛 the reader is a trait object and has no Debug. the name says enough.
impl std::fmt::Debug for NdjsonSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NdjsonSource")
            .field("name", &self.name)
            .field("line_number", &self.line_number)
            .field("skipped", &self.skipped)
            .finish()
    }
}

impl NdjsonSource {
    /// 🏗️ Wrap any reader. `name` shows up in logs, so make it meaningful.
    pub fn new(name: impl Into<String>, reader: Box<dyn AsyncRead + Send + Unpin>) -> Self {
        Self {
            name: name.into(),
            reader: BufReader::new(reader),
            line: Vec::with_capacity(4096),
            line_number: 0,
            skipped: 0,
        }
    }

    /// 🚀 Open `file_name` for reading.
    pub async fn open_file(file_name: &str) -> Result<Self> {
        let file_handle = File::open(file_name).await.context(format!(
            "💀 The door to '{}' would not budge. It might not exist. The permissions might be wrong. \
             The file remains unopened. We remain outside.",
            file_name
        ))?;
        debug!("📂 Reading event records from '{}'", file_name);
        Ok(Self::new(file_name, Box::new(file_handle)))
    }

    /// 🚰 Read from the process's standard input.
    pub fn stdin() -> Self {
        debug!("📥 Reading event records from stdin");
        Self::new("stdin", Box::new(tokio::io::stdin()))
    }
}

#[async_trait]
impl EventSource for NdjsonSource {
    async fn next_event(&mut self) -> Result<Option<Event>> {
        loop {
            self.line.clear();
            let bytes_read = self
                .reader
                .read_until(b'\n', &mut self.line)
                .await
                .context(format!("💀 Reading from '{}' failed mid-stream", self.name))?;
            if bytes_read == 0 {
                trace!("🏁 '{}' is exhausted after {} lines", self.name, self.line_number);
                return Ok(None);
            }
            self.line_number += 1;

            if self.line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let now_millis = chrono::Utc::now().timestamp_millis();
            let the_event = serde_json::from_slice::<EventRecord>(&self.line)
                .map_err(anyhow::Error::from)
                .and_then(|record| record.into_event(now_millis));
            match the_event {
                Ok(event) => return Ok(Some(event)),
                Err(err) => {
                    self.skipped += 1;
                    warn!(
                        "⚠️ Skipping line {} of '{}', it is not an event record: {:#}",
                        self.line_number, self.name, err
                    );
                }
            }
        }
    }

    fn skipped_records(&self) -> u64 {
        self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document;
    use crate::transcode::Charset;
    use serde_json::json;
    use std::io::Write;

    fn the_source(text: &str) -> NdjsonSource {
        NdjsonSource::new("test", Box::new(std::io::Cursor::new(text.as_bytes().to_vec())))
    }

    #[tokio::test]
    async fn the_one_where_every_field_lands_where_it_should() -> Result<()> {
        let mut the_source = the_source(
            r#"{"body":"message goes here","timestamp":0,"host":"localhost","priority":"INFO","attributes":{"attr1":"qux quux quuux","attr3":"{\"key\":\"value\"}"}}"#,
        );
        let the_event = the_source.next_event().await?.expect("one event");

        assert_eq!(the_event.body, b"message goes here".to_vec());
        assert_eq!(the_event.timestamp, EpochTimestamp::Millis(0));
        assert_eq!(the_event.host, "localhost");
        assert_eq!(the_event.priority, Priority::Info);
        assert_eq!(the_event.attributes["attr1"], b"qux quux quuux".to_vec());
        assert_eq!(the_event.attributes["attr3"], br#"{"key":"value"}"#.to_vec());
        assert!(the_source.next_event().await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_json_bodies_become_json_text() -> Result<()> {
        let mut the_source = the_source(
            r#"{"body":{"key":"value"},"timestamp":1500000000000000000,"timestamp_unit":"nanos","priority":"DEBUG","attributes":{"n":42}}"#,
        );
        let the_event = the_source.next_event().await?.expect("one event");

        assert_eq!(the_event.body, br#"{"key":"value"}"#.to_vec());
        assert_eq!(the_event.timestamp, EpochTimestamp::Nanos(1_500_000_000_000_000_000));
        assert_eq!(the_event.timestamp_millis(), 1_500_000_000_000);
        assert_eq!(the_event.host, "localhost");
        assert_eq!(the_event.attributes["n"], b"42".to_vec());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_garbage_lines_are_skipped_and_counted() -> Result<()> {
        let mut the_source = the_source(
            "{\"body\":\"one\",\"timestamp\":1}\n\n   \nthis is not json\n{\"body\":\"two\",\"priority\":\"LOUD\"}\n{\"body\":\"three\",\"timestamp\":3}\n",
        );

        let the_first = the_source.next_event().await?.expect("first");
        assert_eq!(the_first.body, b"one".to_vec());
        let the_second = the_source.next_event().await?.expect("third record survives");
        assert_eq!(the_second.body, b"three".to_vec());
        assert!(the_source.next_event().await?.is_none());

        // 🗑️ blank lines are not records, so they are not skipped records either
        assert_eq!(the_source.skipped_records(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_latin1_bytes_arrive_untouched_in_base64() -> Result<()> {
        // 🇫🇷 "caf\xE9" is café in ISO-8859-1, and not valid UTF-8 at all
        let mut the_source = the_source(
            r#"{"body_base64":"Y2Fm6Q==","timestamp":0,"attributes":{"city":"ignored"},"attributes_base64":{"city":"TfxuY2hlbg=="}}"#,
        );
        let the_event = the_source.next_event().await?.expect("one event");
        assert_eq!(the_event.body, b"caf\xE9".to_vec());
        assert_eq!(the_event.attributes["city"], b"M\xFCnchen".to_vec());

        let the_document = document::build(&the_event, Charset::Latin1).expect("builds");
        assert_eq!(the_document.message, json!({ "text": "café" }));
        assert_eq!(the_document.fields["city"], json!("München"));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_broken_base64_is_a_skipped_record() -> Result<()> {
        let mut the_source = the_source(
            "{\"body_base64\":\"%%% not base64 %%%\"}\n{\"body\":\"fine\",\"timestamp\":0}\n",
        );
        let the_event = the_source.next_event().await?.expect("second record survives");
        assert_eq!(the_event.body, b"fine".to_vec());
        assert!(the_source.next_event().await?.is_none());
        assert_eq!(the_source.skipped_records(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_missing_timestamp_means_now() -> Result<()> {
        let the_before = chrono::Utc::now().timestamp_millis();
        let mut the_source = the_source(r#"{"body":"when?"}"#);
        let the_event = the_source.next_event().await?.expect("one event");
        assert!(the_event.timestamp_millis() >= the_before);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_real_file_is_read_to_the_end() -> Result<()> {
        let mut the_file = tempfile::NamedTempFile::new()?;
        writeln!(the_file, r#"{{"body":"a","timestamp":0}}"#)?;
        writeln!(the_file, r#"{{"body":"b","timestamp":1}}"#)?;
        the_file.flush()?;

        let the_path = the_file.path().to_string_lossy().to_string();
        let mut the_source = NdjsonSource::open_file(&the_path).await?;
        let mut the_bodies = Vec::new();
        while let Some(event) = the_source.next_event().await? {
            the_bodies.push(event.body);
        }
        assert_eq!(the_bodies, vec![b"a".to_vec(), b"b".to_vec()]);
        Ok(())
    }
}
