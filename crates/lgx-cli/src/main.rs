//! 🚀 lgx-cli: the front door, the bouncer, the maitre d' of lgx.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! 📦 This binary crate is the thin CLI wrapper that loads config,
//! sets up logging, and then lets the real code do the heavy lifting.
//! Like a manager. 🦆

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use lgx::RunReport;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// 🪵 Forward log event records into Elasticsearch.
#[derive(Parser, Debug)]
#[command(name = "lgx")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Skipped silently if it doesn't exist.
    #[arg(default_value = "lgx.toml")]
    config: PathBuf,
}

/// 🚀 main(): where it all begins. The "I pressed F5 and held my breath" moment.
///
/// 🔧 Steps:
/// 1. Init tracing (so we can see what goes wrong, and when)
/// 2. Parse args
/// 3. Load config (the moment of truth)
/// 4. Run the thing (send it and pray 🙏)
/// 5. Handle errors (cry), or print the summary (don't)
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // 🔒 Validate the config file exists before we get too emotionally attached
    let config_file = cli.config.as_path();
    let config_file_path_which_is_validated_to_exist = match config_file.try_exists().context(format!(
        "💀 Couldn't tell whether the configuration file exists. If it's a relative path, \
         it's relative to the current directory, so maybe try an absolute one. Was checking here: '{}'",
        config_file.display()
    ))? {
        true => Some(config_file),
        false => None,
    };

    let app_config = lgx::load_config(config_file_path_which_is_validated_to_exist)
        .context("💀 In lgx-cli, main, we couldn't load the configuration. Take a look at the file and the LGX_* variables.")?;

    match lgx::run(app_config).await {
        Ok(report) => {
            println!("{}", summary_table(&report));
            Ok(())
        }
        Err(err) => {
            error!("💀 error: {}", err);
            // -- 🧅 peel the onion of sadness, one layer at a time
            let mut the_vibes_are_giving_connection_issues = false;
            for cause in err.chain().skip(1) {
                error!("⚠️  cause: {}", cause);
                if looks_like_connection_trouble(&cause.to_string()) {
                    the_vibes_are_giving_connection_issues = true;
                }
            }

            if the_vibes_are_giving_connection_issues {
                error!(
                    "🔧 hint: looks like Elasticsearch isn't reachable. \
                    Double-check that the cluster is running and that `host_list` or \
                    `discovery_seed` points at it. If you're using Docker, try \
                    `docker ps` to see what's up. Or set `local_only = true` for a dry run. ☕"
                );
            }

            // 🗑️ Exit with prejudice. Process exitus maximus.
            std::process::exit(1);
        }
    }
}

fn looks_like_connection_trouble(cause: &str) -> bool {
    cause.contains("error sending request")
        || cause.contains("connection refused")
        || cause.contains("Connection refused")
        || cause.contains("tcp connect error")
        || cause.contains("dns error")
        || cause.contains("timed out")
}

/// 🍽️ Two columns, right-aligned, no borders.
fn summary_table(report: &RunReport) -> Table {
    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    let rows = [
        ("events read", report.events_read),
        ("skipped records", report.skipped_records),
        ("indexed", report.metrics.indexed_event_count),
        ("failed", report.metrics.failed_event_count),
    ];
    for (label, count) in rows {
        table.add_row(vec![
            Cell::new(label).set_alignment(CellAlignment::Right),
            Cell::new(count).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}
