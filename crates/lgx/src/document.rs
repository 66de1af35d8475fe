// ai
//! 🏗️ Document Builder: one event in, one search document out, or nothing at all.
//!
//! 🎬 *[the event sits down in the makeover chair. the body gets transcoded. the attributes get
//! transcoded. the timestamp gets an ISO-8601 blowout. one attribute turns out to be malformed
//! JSON. the whole makeover is cancelled. the event goes home exactly as it came.]*
//!
//! All-or-nothing per event: a bad attribute does not get to ship a half-document with a hole
//! where `attr3` used to be. Partial documents are how mappings get haunted.
//!
//! Wire shape:
//! ```text
//! {"timestamp":"1970-01-01T00:00:00.000Z","host":"localhost","priority":"INFO",
//!  "message":{"text":"message goes here"},"fields":{"attr1":"qux quux quuux","attr3":{"key":"value"}}}
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::common::{Event, Priority};
use crate::error::ForwardError;
use crate::transcode::{Charset, classify_and_render};

/// 📄 The per-event search document. Built fresh, serialized once, then forgotten.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub timestamp: String,
    pub host: String,
    pub priority: Priority,
    pub message: Value,
    pub fields: Map<String, Value>,
}

/// 🕰️ Epoch millis → `YYYY-MM-DDTHH:MM:SS.mmmZ`, always UTC, always three fractional digits.
pub fn format_timestamp(millis: i64) -> Result<String, ForwardError> {
    let the_moment = DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or(ForwardError::InvalidTimestamp { millis })?;
    Ok(the_moment.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// 🏗️ Build the document for `event`, decoding opaque bytes with `charset`.
///
/// The body goes through the transcoder under the name `message`; every attribute goes
/// through under its own key. The first transcoder error wins and the event is abandoned.
pub fn build(event: &Event, charset: Charset) -> Result<Document, ForwardError> {
    let timestamp = format_timestamp(event.timestamp_millis())?;
    let message = classify_and_render(&event.body, "message", charset)?.into_message_value();

    let mut fields = Map::new();
    for (the_key, the_raw_value) in &event.attributes {
        let the_fragment = classify_and_render(the_raw_value, the_key, charset)?;
        fields.insert(the_key.clone(), the_fragment.into_attribute_value());
    }

    Ok(Document {
        timestamp,
        host: event.host.clone(),
        priority: event.priority,
        message,
        fields,
    })
}
