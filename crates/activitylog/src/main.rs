//! Activity log command-line tool.
//!
//! Lists entries of a JSON-backed activity log and runs restores against it.
//!
//! Usage:
//!   activitylog list --event deleted
//!   activitylog restore 12 --actor 1 --permission "administer activity log"

use std::path::PathBuf;
use std::sync::Arc;

use activitylog::presentation::{
    causer_label, event_label, flatten_for_display, format_created_at, log_name_label,
    subject_label,
};
use activitylog::query::{distinct_events, distinct_log_names, navigation_badge};
use activitylog::{
    ActivityQuery, Actor, AuditLogStore, Collaborators, Config, EntryId, EventKind, FixedActor,
    MemoryStore, Notice, NotificationSink, PermissionOracle, ResourceRegistry, RestoreEngine,
    RestoreSettings, SubjectRef, TracingSink,
};
use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Inspect and restore activity log entries.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON state file (overrides ACTIVITYLOG_STATE_FILE).
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List entries, newest first by default.
    List(ListArgs),
    /// Show a single entry with its properties.
    Show { id: EntryId },
    /// Restore the previous field values recorded by an entry.
    Restore {
        id: EntryId,
        #[command(flatten)]
        actor: ActorArgs,
    },
    /// Restore the soft-deleted subject of a `deleted` entry.
    RestoreModel {
        id: EntryId,
        #[command(flatten)]
        actor: ActorArgs,
    },
    /// Print the resource URL of an entry's subject.
    Url { id: EntryId },
}

#[derive(Args, Debug)]
struct ListArgs {
    #[arg(long)]
    event: Option<String>,
    #[arg(long)]
    log_name: Option<String>,
    /// Earliest creation date (YYYY-MM-DD), inclusive.
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Latest creation date (YYYY-MM-DD), inclusive.
    #[arg(long)]
    until: Option<NaiveDate>,
    #[arg(long, requires = "subject_id")]
    subject_type: Option<String>,
    #[arg(long, requires = "subject_type")]
    subject_id: Option<String>,
}

#[derive(Args, Debug)]
struct ActorArgs {
    /// Acting user id. Without it the restore runs unattributed.
    #[arg(long)]
    actor: Option<String>,
    #[arg(long, requires = "actor")]
    actor_name: Option<String>,
    /// Permission held by the actor; repeatable.
    #[arg(long = "permission", requires = "actor")]
    permissions: Vec<String>,
}

impl ActorArgs {
    fn context(&self) -> FixedActor {
        match &self.actor {
            Some(id) => {
                let mut actor = Actor::new(id.clone());
                actor.name = self.actor_name.clone();
                actor.permissions = self.permissions.clone();
                FixedActor::new(actor)
            }
            None => FixedActor::anonymous(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let mut config = Config::from_env().context("failed to load configuration")?;
    if let Some(state) = cli.state {
        config.state_file = state;
    }

    let store = MemoryStore::load(&config.state_file).await?;

    match cli.command {
        Command::List(args) => cmd_list(&store, &config, args).await,
        Command::Show { id } => cmd_show(&store, &config, id).await,
        Command::Restore { id, actor } => {
            let engine = build_engine(&store, &config, actor.context());
            let result = engine.restore_fields(id).await;
            TracingSink.send(&Notice::for_field_restore(&result));
            let outcome = result.with_context(|| format!("failed to restore activity {id}"))?;
            store.save(&config.state_file).await?;
            println!(
                "restored {} (logged as {})",
                outcome.entity.subject,
                logged_label(outcome.logged.as_ref().map(|e| e.id))
            );
            Ok(())
        }
        Command::RestoreModel { id, actor } => {
            let engine = build_engine(&store, &config, actor.context());
            let result = engine.restore_from_soft_delete(id).await;
            TracingSink.send(&Notice::for_soft_delete_restore(&result));
            let outcome = result.with_context(|| format!("failed to restore subject of {id}"))?;
            store.save(&config.state_file).await?;
            println!(
                "undeleted {} (logged as {})",
                outcome.entity.subject,
                logged_label(outcome.logged.as_ref().map(|e| e.id))
            );
            Ok(())
        }
        Command::Url { id } => {
            let engine = build_engine(&store, &config, FixedActor::anonymous());
            let entry = store
                .find(id)
                .await?
                .with_context(|| format!("activity {id} not found"))?;
            println!("{}", engine.resources().url_or_placeholder(&entry));
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Build an engine over `store`, registering every stored subject type
/// with the default resource mapping.
fn build_engine(store: &MemoryStore, config: &Config, actors: FixedActor) -> RestoreEngine {
    let resources = ResourceRegistry::new(config.panel_id.clone());
    for entry in store.entries() {
        if let Some(subject) = &entry.subject {
            resources.register(subject.subject_type.clone());
        }
    }

    let collaborators = Collaborators {
        log: Arc::new(store.clone()),
        entities: Arc::new(store.clone()),
        oracle: Arc::new(PermissionOracle),
        actors: Arc::new(actors),
    };
    info!(resources = resources.len(), "restore engine ready");
    RestoreEngine::new(collaborators, resources, RestoreSettings::from(config))
}

fn logged_label(id: Option<EntryId>) -> String {
    id.map(|id| format!("#{id}"))
        .unwrap_or_else(|| "nothing, no actor".to_string())
}

async fn cmd_list(store: &MemoryStore, config: &Config, args: ListArgs) -> Result<()> {
    let mut query = ActivityQuery::new()
        .sorted_by(config.default_sort_column, config.default_sort_direction);
    query.event = args.event.map(EventKind::from);
    query.log_name = args.log_name;
    query.created_from = args.from;
    query.created_until = args.until;
    if let (Some(subject_type), Some(subject_id)) = (args.subject_type, args.subject_id) {
        query.subject = Some(SubjectRef::new(subject_type, subject_id));
    }
    if let (Some(from), Some(until)) = (query.created_from, query.created_until)
        && from > until
    {
        bail!("--from {from} is after --until {until}");
    }

    for (_, label) in query.filter_indicators(&config.date_format) {
        println!("{label}");
    }

    let engine = build_engine(store, config, FixedActor::anonymous());
    let entries = store.list(&query).await?;
    if entries.is_empty() {
        println!("No activity found.");
        return Ok(());
    }

    println!(
        "{:<6} {:<10} {:<12} {:<36} {:<10} {}",
        "ID", "EVENT", "LOG", "SUBJECT", "CAUSER", "CREATED"
    );
    println!("{}", "-".repeat(100));
    for entry in &entries {
        let state = engine.subject_state(entry).await;
        println!(
            "{:<6} {:<10} {:<12} {:<36} {:<10} {}",
            entry.id,
            event_label(&entry.event),
            log_name_label(entry.log_name.as_deref()),
            subject_label(entry, state),
            causer_label(entry.causer_name.as_deref()),
            format_created_at(&entry.created_at, &config.datetime_format),
        );
    }

    let all = store.entries();
    let events: Vec<String> = distinct_events(&all).iter().map(|e| e.to_string()).collect();
    println!();
    println!("events: {}", events.join(", "));
    println!("logs: {}", distinct_log_names(&all).join(", "));
    if let Some(badge) = navigation_badge(all.len(), config.navigation_count_badge) {
        println!("total: {badge}");
    }
    Ok(())
}

async fn cmd_show(store: &MemoryStore, config: &Config, id: EntryId) -> Result<()> {
    let entry = store
        .find(id)
        .await?
        .with_context(|| format!("activity {id} not found"))?;
    let engine = build_engine(store, config, FixedActor::anonymous());
    let state = engine.subject_state(&entry).await;

    println!("id:          {}", entry.id);
    println!("event:       {}", event_label(&entry.event));
    println!("log:         {}", log_name_label(entry.log_name.as_deref()));
    println!("description: {}", entry.description);
    println!("subject:     {}", subject_label(&entry, state));
    println!("causer:      {}", causer_label(entry.causer_name.as_deref()));
    if let Some(causer_id) = &entry.causer_id {
        println!("causer id:   {causer_id}");
    }
    println!(
        "created:     {}",
        format_created_at(&entry.created_at, &config.datetime_format)
    );
    println!("url:         {}", engine.resources().url_or_placeholder(&entry));

    for (title, fields) in [
        ("old", entry.properties.old.as_ref()),
        ("attributes", entry.properties.attributes.as_ref()),
    ] {
        let Some(fields) = fields else { continue };
        println!("{title}:");
        for (key, value) in flatten_for_display(fields) {
            println!("  {key:<20} {value}");
        }
    }
    if let Some(meta) = &entry.properties.restore_metadata {
        println!(
            "restored from: activity {} ({})",
            meta.original_activity_id, meta.restore_type
        );
    }
    Ok(())
}
