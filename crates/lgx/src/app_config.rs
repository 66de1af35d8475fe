//! 🔧 App Configuration: the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing.": every developer at 3am 🦆
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of
//! self-harm that even the borrow checker wouldn't approve of.
//!
//! Every section has defaults, so an empty file (or no file at all) forwards stdin into a
//! local cluster's `flume` index. `LGX_`-prefixed env vars fill in, and nested keys use `__`:
//! `LGX_SINK_CONFIG__HOST_LIST="es1:9200,es2:9200"`.

use std::path::Path;

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::sink::ElasticsearchSinkConfig;
use crate::sources::SourceConfig;

/// 📦 One struct to rule them all, one struct to find them,
/// one struct to bring them all, and in the Figment bind them.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct AppConfig {
    /// 📡 Where events come from.
    #[serde(default)]
    pub source_config: SourceConfig,
    /// 🕳️ Where events go.
    #[serde(default)]
    pub sink_config: ElasticsearchSinkConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// 🧵 Knobs for the host side, not the sink.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// 📬 How many events may wait between the source and the sink.
    #[serde(default = "default_queue_capacity", alias = "channel_size")]
    pub queue_capacity: usize,
}

fn default_queue_capacity() -> usize {
    10
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// 🚀 Load the config: from a file, from env vars, or from the sheer power of hoping.
///
/// 📐 If `config_file_name` is None → env vars only. If Some → env vars + TOML file, merged.
/// TOML wins on conflicts.
///
/// 💀 Returns an error if config is unparseable. The message says which source to blame.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed("LGX_").split("__"));
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (LGX_*). \
             The file exists in our hearts, but apparently not in a shape we understand.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (LGX_*). \
                 No file was provided, this one's all on the environment. Classic."
            .to_string(),
    };

    config.extract().context(context_msg)
}
