//! # Core Inspect CLI
//!
//! Command-line tool for poking at mobile core state on disk.
//!
//! Usage:
//!   core-inspect history record --data '{"action":"click"}' [--mask action]
//!   core-inspect history count --events '[{"action":"click"}]' [--ordered]
//!   core-inspect history delete --events '[{"action":"click"}]'
//!   core-inspect cache get <cache_name> <key>
//!   core-inspect rules extract <rules.zip> [--dest DIR]
//!   core-inspect rules eval <rules.json> --event '{"type":"launch"}'

use clap::{Parser, Subcommand};
use log::info;
use mobile_core::cache::{CacheService, FileCacheService};
use mobile_core::history::{
    EventHistory, EventHistoryDatabase, EventHistoryRequest, HistoryLookup,
};
use mobile_core::loader::zip_bundle;
use mobile_core::rules::{
    parse_rules, ConditionEvaluator, EventTokenFinder, RulesEngine, Transformer,
};
use mobile_core::{CoreConfig, Event, LocalDeviceInfo};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "core-inspect")]
#[command(about = "Inspect mobile core cache, event history and rules", long_about = None)]
struct Cli {
    /// Root directory holding cache/, databases/ and assets/
    #[arg(short, long, default_value = "./var/mobile-core")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Event history operations
    History {
        #[command(subcommand)]
        action: HistoryCommand,
    },

    /// File cache operations
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },

    /// Rule set operations
    Rules {
        #[command(subcommand)]
        action: RulesCommand,
    },
}

#[derive(Subcommand)]
enum HistoryCommand {
    /// Record an event fingerprint
    Record {
        /// Event data as a JSON object
        #[arg(long)]
        data: String,

        /// Keys that participate in the fingerprint
        #[arg(long, value_delimiter = ',')]
        mask: Option<Vec<String>>,
    },

    /// Count matches for one or more event masks
    Count {
        /// JSON array of event data masks
        #[arg(long)]
        events: String,

        /// Require the events to have happened in the given order
        #[arg(long)]
        ordered: bool,

        /// Start timestamp (Unix ms)
        #[arg(long, default_value_t = 0)]
        from: i64,

        /// End timestamp (Unix ms, 0 = now)
        #[arg(long, default_value_t = 0)]
        to: i64,
    },

    /// Delete matches for one or more event masks
    Delete {
        /// JSON array of event data masks
        #[arg(long)]
        events: String,

        /// Start timestamp (Unix ms)
        #[arg(long, default_value_t = 0)]
        from: i64,

        /// End timestamp (Unix ms, 0 = now)
        #[arg(long, default_value_t = 0)]
        to: i64,
    },
}

#[derive(Subcommand)]
enum CacheCommand {
    /// Print a cached entry and its metadata
    Get {
        /// Cache bucket name
        cache_name: String,

        /// Entry key
        key: String,
    },
}

#[derive(Subcommand)]
enum RulesCommand {
    /// Extract a rules zip and print its rules.json
    Extract {
        /// Path to the zip bundle
        zip: PathBuf,

        /// Extraction directory (defaults to a temporary one)
        #[arg(long)]
        dest: Option<PathBuf>,
    },

    /// Evaluate a rules.json against one event
    Eval {
        /// Path to rules.json
        rules: PathBuf,

        /// Event data as a JSON object
        #[arg(long)]
        event: String,

        /// Event type
        #[arg(long, default_value = "com.adobe.eventType.generic.track")]
        event_type: String,

        /// Event source
        #[arg(long, default_value = "com.adobe.eventSource.requestContent")]
        event_source: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), String> {
    env_logger::init();
    let cli = Cli::parse();

    let config = CoreConfig::from_env();
    let device = Arc::new(LocalDeviceInfo::rooted_at(&cli.root));
    info!("Using root {}", cli.root.display());

    match cli.command {
        Commands::History { action } => {
            let database = EventHistoryDatabase::open(device.as_ref(), &config)?;
            let history = EventHistory::new(database)?;
            run_history(&history, action).await?;
        }

        Commands::Cache {
            action: CacheCommand::Get { cache_name, key },
        } => {
            let cache = FileCacheService::new(device, &config);
            match cache.get(&cache_name, &key) {
                Some(mut entry) => {
                    println!("Path:     {}", entry.path.display());
                    println!("Expiry:   {:?}", entry.expiry);
                    println!("Metadata: {:?}", entry.metadata);
                    println!();
                    println!("{}", entry.read_to_string()?);
                }
                None => println!("No entry for '{}' in '{}'", key, cache_name),
            }
        }

        Commands::Rules {
            action: RulesCommand::Extract { zip, dest },
        } => {
            let scratch = extraction_dir(dest)?;
            let rules = zip_bundle::extract_rules_json(&zip, &scratch)?;
            println!("{}", rules);
        }

        Commands::Rules {
            action:
                RulesCommand::Eval {
                    rules,
                    event,
                    event_type,
                    event_source,
                },
        } => {
            let json = std::fs::read_to_string(&rules)
                .map_err(|e| format!("Failed to read {}: {}", rules.display(), e))?;

            // Lookups queue on the history worker like every other history call
            let history = EventHistoryDatabase::open(device.as_ref(), &config)
                .and_then(EventHistory::new)
                .map(|history| Arc::new(history) as Arc<dyn HistoryLookup>)
                .ok();
            let launch_rules = parse_rules(&json, history)?;

            let engine = RulesEngine::new(
                Arc::new(ConditionEvaluator::default()),
                Arc::new(Transformer::with_defaults()),
            );
            engine.replace_rules(Some(launch_rules));

            let event = Event::builder("core-inspect", event_type, event_source)
                .data(parse_object(&event)?)
                .build();
            let finder = EventTokenFinder::new(&event);

            let matched = engine.evaluate(&finder);
            println!("{} of {} rule(s) matched\n", matched.len(), engine.rules().len());
            for rule in matched {
                for consequence in rule.expanded_consequences(&finder, engine.transformer()) {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&consequence)
                            .map_err(|e| format!("Failed to render consequence: {}", e))?
                    );
                }
            }
        }
    }

    Ok(())
}

async fn run_history(history: &EventHistory, action: HistoryCommand) -> Result<(), String> {
    match action {
        HistoryCommand::Record { data, mask } => {
            let mut builder =
                Event::builder("core-inspect", "inspect", "cli").data(parse_object(&data)?);
            if let Some(mask) = mask {
                builder = builder.mask(mask);
            }
            let event = builder.build();

            match history.record_event(&event).await {
                Some(true) => println!("Recorded hash {}", event.history_hash()),
                Some(false) => println!("Failed to record hash {}", event.history_hash()),
                None => println!("Nothing to record: event data hashes to 0"),
            }
        }

        HistoryCommand::Count {
            events,
            ordered,
            from,
            to,
        } => {
            let requests = parse_requests(&events, from, to)?;
            let count = history.get_events(requests, ordered).await;
            println!("{}", count);
        }

        HistoryCommand::Delete { events, from, to } => {
            let requests = parse_requests(&events, from, to)?;
            let deleted = history.delete_events(requests).await;
            println!("Deleted {} row(s)", deleted);
        }
    }

    Ok(())
}

fn parse_object(json: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(json) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("Expected a JSON object".to_string()),
        Err(e) => Err(format!("Invalid JSON: {}", e)),
    }
}

fn parse_requests(json: &str, from: i64, to: i64) -> Result<Vec<EventHistoryRequest>, String> {
    let masks: Vec<Map<String, Value>> = serde_json::from_str(json)
        .map_err(|e| format!("Expected a JSON array of objects: {}", e))?;
    Ok(masks
        .into_iter()
        .map(|mask| EventHistoryRequest::new(mask, from, to))
        .collect())
}

fn extraction_dir(dest: Option<PathBuf>) -> Result<PathBuf, String> {
    let dir = dest.unwrap_or_else(|| std::env::temp_dir().join("core-inspect-rules"));
    std::fs::create_dir_all(&dir)
        .map_err(|e| format!("Failed to create {}: {}", dir.display(), e))?;
    Ok(dir)
}
