// ai
//! 🗓️ Index Resolver: which index does this log line live in?
//!
//! 🎬 *[a log line from 1970-01-01 and a log line from 1970-01-02 meet in the pipeline.]*
//! *["we should go to the same index," says one.]* *["we can't," says the other. "pattern says daily."]*
//! *[they part ways. an alias keeps them in touch.]*
//!
//! Without a pattern every event goes to the static index name. With a pattern like
//! `logs_%Y-%m-%d` the event's own timestamp (UTC, always UTC, UTC is the only timezone
//! that never lied to anyone) picks the index, and the static name turns into an alias
//! spanning every index the pattern has ever produced.
//!
//! 🧠 Knowledge graph:
//! - strftime tokens: chrono's set (`%Y`, `%m`, `%d`, `%H`, `%j`, ...)
//! - `%{name}`: replaced with the event attribute `name`, empty when absent
//! - A name that comes out blank is [`ForwardError::EmptyIndexName`]. Nobody gets to write into `""`.
//! - The pattern is validated once in [`IndexResolver::new`]. Bad tokens are a config error.
//! - [`IndexTarget::needs_alias`] tells the dispatcher whether an alias is owed. 🦆

use std::fmt::Write as _;

use anyhow::{Context, Result};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};

use crate::common::Event;
use crate::error::ForwardError;

/// 🎯 Where one event is going, and what it should be findable as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTarget {
    pub resolved_name: String,
    pub alias_name: String,
}

impl IndexTarget {
    /// 🏷️ An alias is owed whenever the document lands somewhere other than the stable name.
    pub fn needs_alias(&self) -> bool {
        self.resolved_name != self.alias_name
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternSegment {
    /// 🗓️ A run of literal text and strftime tokens, handed to chrono as-is.
    Calendar(String),
    /// 📎 `%{name}`: an event attribute spliced into the name.
    Attribute(String),
}

/// 🗓️ Computes the target index for each event from a static name and an optional pattern.
#[derive(Debug, Clone)]
pub struct IndexResolver {
    static_index_name: String,
    pattern: Option<String>,
    segments: Vec<PatternSegment>,
}

impl IndexResolver {
    /// 🏗️ Build a resolver, validating the pattern up front.
    ///
    /// An empty pattern counts as no pattern at all. An unknown strftime token, or a `%{`
    /// that never finds its `}`, is an error here so it can't be one later.
    pub fn new(static_index_name: impl Into<String>, index_pattern: Option<&str>) -> Result<Self> {
        let static_index_name = static_index_name.into();
        anyhow::ensure!(
            !static_index_name.trim().is_empty(),
            "💀 The static index name is empty. Documents need a home, and aliases need a name."
        );

        let pattern = index_pattern
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        let segments = match pattern.as_deref() {
            Some(p) => parse_pattern(p)
                .with_context(|| format!("💀 Index pattern '{}' does not parse", p))?,
            None => Vec::new(),
        };

        Ok(Self {
            static_index_name,
            pattern,
            segments,
        })
    }

    /// 🏷️ The configured stable name (and alias target).
    pub fn static_index_name(&self) -> &str {
        &self.static_index_name
    }

    /// 🗓️ The configured pattern, if any.
    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    /// 🎯 Resolve the target index for `event`.
    pub fn resolve(&self, event: &Event) -> Result<IndexTarget, ForwardError> {
        let Some(the_pattern) = self.pattern.as_deref() else {
            return Ok(IndexTarget {
                resolved_name: self.static_index_name.clone(),
                alias_name: self.static_index_name.clone(),
            });
        };

        let millis = event.timestamp_millis();
        let the_moment = DateTime::<Utc>::from_timestamp_millis(millis)
            .ok_or(ForwardError::InvalidTimestamp { millis })?;

        let mut resolved_name = String::with_capacity(the_pattern.len() + 8);
        for segment in &self.segments {
            match segment {
                PatternSegment::Calendar(tokens) => {
                    write!(
                        resolved_name,
                        "{}",
                        the_moment.format_with_items(StrftimeItems::new(tokens))
                    )
                    .map_err(|_| ForwardError::IndexPattern {
                        pattern: the_pattern.to_string(),
                    })?;
                }
                PatternSegment::Attribute(name) => {
                    if let Some(the_value) = event.attributes.get(name) {
                        resolved_name.push_str(&String::from_utf8_lossy(the_value));
                    }
                }
            }
        }

        if resolved_name.trim().is_empty() {
            return Err(ForwardError::EmptyIndexName {
                pattern: the_pattern.to_string(),
            });
        }

        Ok(IndexTarget {
            resolved_name,
            alias_name: self.static_index_name.clone(),
        })
    }
}

/// 🔪 Split a pattern into chrono-formatted runs and `%{attr}` splices, validating both.
fn parse_pattern(pattern: &str) -> Result<Vec<PatternSegment>> {
    let mut segments = Vec::new();
    let mut calendar = String::new();
    let mut chars = pattern.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            calendar.push(c);
            continue;
        }
        match chars.next() {
            Some('{') => {
                let mut name = String::new();
                let mut closed = false;
                for n in chars.by_ref() {
                    if n == '}' {
                        closed = true;
                        break;
                    }
                    name.push(n);
                }
                anyhow::ensure!(closed, "💀 '%{{{}' is missing its closing '}}'", name);
                anyhow::ensure!(!name.is_empty(), "💀 '%{{}}' names no attribute");
                if !calendar.is_empty() {
                    segments.push(PatternSegment::Calendar(std::mem::take(&mut calendar)));
                }
                segments.push(PatternSegment::Attribute(name));
            }
            // -- 🔁 `%%`, `%-d`, `%.3f` and friends go to chrono untouched
            Some(other) => {
                calendar.push('%');
                calendar.push(other);
            }
            None => calendar.push('%'),
        }
    }
    if !calendar.is_empty() {
        segments.push(PatternSegment::Calendar(calendar));
    }

    for segment in &segments {
        if let PatternSegment::Calendar(tokens) = segment {
            if StrftimeItems::new(tokens).any(|item| matches!(item, Item::Error)) {
                anyhow::bail!("💀 '{}' contains a date token chrono has never heard of", tokens);
            }
        }
    }

    Ok(segments)
}
