// ai
//! 🔬 Field Transcoder: is this JSON, or is it just a sentence with ambitions?
//!
//! 🎬 COLD OPEN: INT. CUSTOMS DESK: BYTE ARRIVALS HALL
//!
//! A payload steps up to the counter. "Anything to declare?" The payload clears its
//! throat. Its first non-whitespace byte is `{`. "JSON," it says. The officer nods,
//! runs it through the parser, and either waves it through as a tree or arrests it
//! on the spot for perjury. There is no third option. There is no "eh, let it in as text".
//!
//! Everything else (plain sentences, numbers, `true`, a stack trace, the Bee Movie
//! script) is decoded with the configured charset and wrapped up as text.
//!
//! 🧠 Knowledge graph:
//! - `classify_and_render`: bytes → [`FieldFragment`]. Pure. No I/O. No state. Same bytes,
//!   same answer, every time, forever.
//! - Detection only looks at the bytes: an optional UTF-8 BOM, JSON whitespace, then `{` or `[`.
//! - A self-declared JSON payload that fails to parse is a [`ForwardError::Transcode`]. The
//!   event dies. That's the deal.
//! - [`Charset`]: how opaque bytes become a `String`.
//!
//! ⚠️ Scalars (`42`, `"quoted"`, `null`) are text here. A log attribute that happens to read
//! `true` does not get to become a boolean and wreck somebody's index mapping. 🦆

use std::str::FromStr;

use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::ForwardError;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// 🔤 How opaque bytes get turned into text.
///
/// Parsed case-insensitively from config: `UTF-8`, `utf8`, `ISO-8859-1`, `latin1`,
/// `US-ASCII`, `ascii`. Unknown names are rejected when the config loads, not at 3am
/// when the first event shows up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Charset {
    /// ✅ The default. Invalid sequences become U+FFFD instead of becoming an incident.
    #[default]
    Utf8,
    /// 🇪🇺 One byte, one char. Every byte is valid. Bliss.
    Latin1,
    /// 🦕 Seven bits or bust. Anything ≥ 0x80 becomes U+FFFD.
    Ascii,
}

impl Charset {
    /// 🔄 Decode bytes into a `String`. Never fails. Lossy where it has to be.
    pub fn decode(&self, raw: &[u8]) -> String {
        match self {
            Charset::Utf8 => String::from_utf8_lossy(raw).into_owned(),
            Charset::Latin1 => raw.iter().map(|&b| char::from(b)).collect(),
            Charset::Ascii => raw
                .iter()
                .map(|&b| if b.is_ascii() { char::from(b) } else { char::REPLACEMENT_CHARACTER })
                .collect(),
        }
    }

    /// 🏷️ Canonical name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Charset::Utf8 => "UTF-8",
            Charset::Latin1 => "ISO-8859-1",
            Charset::Ascii => "US-ASCII",
        }
    }
}

impl FromStr for Charset {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // -- 🧹 "UTF-8", "utf_8", "Utf8" all mean the same thing. Humans are creative with dashes.
        let the_normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        match the_normalized.as_str() {
            "utf8" => Ok(Charset::Utf8),
            "iso88591" | "latin1" | "l1" => Ok(Charset::Latin1),
            "usascii" | "ascii" => Ok(Charset::Ascii),
            _ => anyhow::bail!(
                "💀 Unknown charset '{}'. We speak UTF-8, ISO-8859-1 and US-ASCII. Pick one of those.",
                s
            ),
        }
    }
}

impl TryFrom<String> for Charset {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// 🧩 The rendered value for one field of a log event.
///
/// Which variant you get is decided once, by [`classify_and_render`]. Where the fragment
/// lands decides how `Text` is written: under `message` it is `{"text": ...}`, under
/// `fields` it is the bare string. `Structured` is written as-is everywhere.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldFragment {
    Text(String),
    Structured(Value),
}

impl FieldFragment {
    /// 📨 Render for the document's `message` slot.
    pub fn into_message_value(self) -> Value {
        match self {
            FieldFragment::Text(text) => json!({ "text": text }),
            FieldFragment::Structured(tree) => tree,
        }
    }

    /// 📎 Render for a slot under the document's `fields` object.
    pub fn into_attribute_value(self) -> Value {
        match self {
            FieldFragment::Text(text) => Value::String(text),
            FieldFragment::Structured(tree) => tree,
        }
    }
}

/// 🔍 Strip an optional UTF-8 BOM and leading JSON whitespace. What's left is what
/// the payload actually starts with.
fn trim_leading_noise(raw: &[u8]) -> &[u8] {
    let without_bom = raw.strip_prefix(UTF8_BOM).unwrap_or(raw);
    let first_real_byte = without_bom
        .iter()
        .position(|b| !matches!(b, b' ' | b'\t' | b'\n' | b'\r'))
        .unwrap_or(without_bom.len());
    &without_bom[first_real_byte..]
}

/// 🕵️ Does this payload declare itself as JSON? Only the first meaningful byte is asked.
pub fn looks_structured(raw: &[u8]) -> bool {
    matches!(trim_leading_noise(raw).first(), Some(b'{') | Some(b'['))
}

/// 🔬 Classify `raw` and render it as a [`FieldFragment`].
///
/// - Declares JSON and parses: `Structured(tree)`, the tree exactly as parsed.
/// - Declares JSON and doesn't parse: `Err(ForwardError::Transcode)` naming `field_name`.
/// - Anything else: `Text(charset.decode(raw))`.
pub fn classify_and_render(
    raw: &[u8],
    field_name: &str,
    charset: Charset,
) -> Result<FieldFragment, ForwardError> {
    if !looks_structured(raw) {
        return Ok(FieldFragment::Text(charset.decode(raw)));
    }

    // -- 🌳 the BOM is not part of the JSON, serde_json would choke on it
    let the_json_bytes = raw.strip_prefix(UTF8_BOM).unwrap_or(raw);
    serde_json::from_slice::<Value>(the_json_bytes)
        .map(FieldFragment::Structured)
        .map_err(|source| ForwardError::Transcode {
            field: field_name.to_string(),
            source,
        })
}
