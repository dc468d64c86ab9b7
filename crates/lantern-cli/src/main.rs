//! Lantern - suggestion panel store from the command line
//!
//! Lists, searches, rates and prunes the AI suggestions an editor panel has
//! collected for a project. Every change goes through the same command path
//! the panel uses and is written back to `.lantern/` afterwards.

mod render;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use lantern_adapters::cache::Cache;
use lantern_adapters::config::Config;
use lantern_core::{
    handle_command, Command, Event, PanelView, Suggestion, SuggestionRepository, SuggestionState,
    SuggestionStatus, UsageStats,
};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "lantern",
    about = "Search and manage stored AI code suggestions",
    version
)]
struct Args {
    /// Project directory holding `.lantern/` (defaults to config, then the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List suggestions, filtered by every given search term
    List {
        query: Vec<String>,
        /// Print the panel view as JSON
        #[arg(long)]
        json: bool,
    },
    /// Store a new suggestion
    Add(AddArgs),
    /// Post a follow-up message under an existing suggestion
    Reply { parent_id: String, message: String },
    /// Rate a suggestion from 1 to 5
    Rate { id: String, rating: u8 },
    /// Remove a suggestion (no-op when it is already gone)
    Remove { id: String },
    /// Remove every suggestion
    Clear,
    /// Summarize requests, tokens and ratings
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Show user settings, or update them when a value is given
    Config {
        #[arg(long)]
        log_filter: Option<String>,
        #[arg(long)]
        storage_root: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
struct AddArgs {
    #[arg(long)]
    issue: String,
    #[arg(long, default_value = "")]
    suggestion: String,
    #[arg(long)]
    feature: Option<String>,
    #[arg(long)]
    file: Option<String>,
    #[arg(long = "tag")]
    tags: Vec<String>,
    #[arg(long, default_value = "success")]
    status: SuggestionStatus,
    #[arg(long)]
    finding_id: Option<String>,
    #[arg(long)]
    conversation_id: Option<String>,
    #[arg(long)]
    parent_id: Option<String>,
    #[arg(long)]
    tokens: Option<u64>,
    #[arg(long)]
    response_ms: Option<u64>,
}

impl AddArgs {
    fn into_record(self, id: String) -> Suggestion {
        let mut record = Suggestion::new(id, self.issue, self.suggestion).with_status(self.status);
        record.feature = self.feature;
        record.file = self.file;
        record.finding_id = self.finding_id;
        record.conversation_id = self.conversation_id;
        record.parent_id = self.parent_id;
        record.tokens_used = self.tokens;
        record.response_time = self.response_ms;
        if !self.tags.is_empty() {
            record.tags = Some(self.tags);
        }
        record
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load();
    init_tracing(&config);

    let mut stdout = std::io::stdout().lock();
    run(args, &config, &mut stdout)
}

/// Log to stderr; `RUST_LOG` wins over the configured filter.
fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter()));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init()
        .ok();
}

fn run(args: Args, config: &Config, out: &mut impl Write) -> Result<()> {
    let root = config.resolve_root(args.root.as_deref());
    let cache = Cache::new(&root);
    let state = cache.load_state()?;
    tracing::debug!(root = %root.display(), records = state.len(), "loaded suggestion store");

    match args.command {
        Commands::List { query, json } => {
            let (state, _) = handle_command(
                &state,
                Command::Search {
                    query: serde_json::Value::String(query.join(" ")),
                },
            );
            if json {
                let view = PanelView::from_state(&state);
                writeln!(out, "{}", serde_json::to_string_pretty(&view)?)?;
            } else {
                render::write_list(out, &state)?;
            }
        }
        Commands::Add(add) => {
            let id = uuid::Uuid::new_v4().to_string();
            let record = add.into_record(id.clone());
            apply(&cache, &state, Command::Append { record })?;
            writeln!(out, "Added {}", id)?;
        }
        Commands::Reply { parent_id, message } => {
            let Some(parent) = state.get(&parent_id) else {
                bail!("No suggestion with id '{}'", parent_id);
            };
            let id = uuid::Uuid::new_v4().to_string();
            let record = Suggestion::follow_up(id.clone(), parent, message);
            let next = apply(&cache, &state, Command::Append { record })?;
            let thread_id = next
                .get(&id)
                .and_then(|r| r.conversation_id.clone())
                .unwrap_or_default();
            writeln!(
                out,
                "Added {} ({} messages in thread)",
                id,
                next.thread(&thread_id).len()
            )?;
        }
        Commands::Rate { id, rating } => {
            apply(&cache, &state, Command::Rate { id: id.clone(), rating })?;
            writeln!(out, "Rated {} {}/5", id, rating)?;
        }
        Commands::Remove { id } => {
            let existed = state.contains(&id);
            apply(&cache, &state, Command::Remove { id: id.clone() })?;
            if existed {
                writeln!(out, "Removed {}", id)?;
            } else {
                writeln!(out, "Nothing to remove for {}", id)?;
            }
        }
        Commands::Clear => {
            let count = state.len();
            apply(&cache, &state, Command::Clear)?;
            writeln!(out, "Cleared {} suggestions", count)?;
        }
        Commands::Stats { json } => {
            let stats = UsageStats::from_suggestions(state.all());
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&stats)?)?;
            } else {
                render::write_stats(out, &stats)?;
            }
        }
        Commands::Config {
            log_filter,
            storage_root,
        } => {
            if log_filter.is_none() && storage_root.is_none() {
                writeln!(out, "{}", Config::config_location())?;
                writeln!(out, "{}", serde_json::to_string_pretty(config)?)?;
                return Ok(());
            }
            let mut updated = config.clone();
            if log_filter.is_some() {
                updated.log_filter = log_filter;
            }
            if storage_root.is_some() {
                updated.storage_root = storage_root;
            }
            updated.save()?;
            writeln!(out, "Saved {}", Config::config_location())?;
        }
    }
    Ok(())
}

/// Run a mutation through the store and persist the result.
fn apply(cache: &Cache, state: &SuggestionState, command: Command) -> Result<SuggestionState> {
    let clearing = matches!(command, Command::Clear);
    let persist = command.is_mutation();
    let (next, event) = handle_command(state, command);
    if let Event::Error { message, .. } = event {
        bail!(message);
    }
    if clearing {
        cache.clear()?;
    } else if persist {
        cache.save(next.all())?;
    }
    Ok(next)
}
