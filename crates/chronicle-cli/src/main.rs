use std::str::FromStr;
use std::sync::Arc;

use chronicle_core::config::ChronicleConfig;
use chronicle_core::types::{EntityKind, RoomId, RunMode, RunStatus, SearchScope};
use chronicle_runs::{JobKind, Liveness, RunController};
use chronicle_store::ArchiveStore;
use chronicle_windows::WindowConfig;
use clap::{Parser, Subcommand};

mod gateways;

#[derive(Parser)]
#[command(name = "chronicle")]
#[command(about = "Chat archive analysis: discussion tracking, topic classification, hybrid search")]
#[command(version, long_about = None)]
struct Cli {
    /// Path to chronicle.toml; defaults to ~/.chronicle/chronicle.toml
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start an analysis run for a room (full or incremental).
    Analyze {
        room_id: i64,
        #[arg(long, default_value = "incremental")]
        mode: String,
    },
    /// Report the status of the most recent analysis run for a room.
    AnalysisStatus { room_id: i64 },
    /// Show what an incremental run would process without running it.
    PreviewIncremental { room_id: i64 },
    /// Run one topic-classification pass over a room's discussions.
    ClassifyTopics { room_id: i64 },
    /// Hybrid semantic + keyword search across messages, discussions, people, and topics.
    Search {
        query: String,
        #[arg(long, default_value = "all")]
        scope: String,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 20)]
        page_size: usize,
    },
    /// Re-embed entities in bulk, optionally scoped to one kind.
    Reindex {
        #[arg(long)]
        kind: Option<String>,
    },
    /// Report bulk-reindex progress (only meaningful while a reindex is running in this process).
    ReindexStatus,
    /// Embed or refresh a single entity's vector.
    EmbedEntity { kind: String, id: i64 },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "chronicle_cli=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = ChronicleConfig::load(cli.config.as_deref())?;
    let store = Arc::new(ArchiveStore::open(&config.database.path)?);
    let gateways = gateways::build(&config)?;
    let controller = RunController::new(store.clone());

    match cli.command {
        Command::Analyze { room_id, mode } => analyze(&store, &gateways, &controller, &config, room_id, &mode).await?,
        Command::AnalysisStatus { room_id } => analysis_status(&store, &controller, room_id)?,
        Command::PreviewIncremental { room_id } => preview_incremental(&store, &config, room_id)?,
        Command::ClassifyTopics { room_id } => classify_topics(&store, &gateways, &controller, room_id).await?,
        Command::Search { query, scope, page, page_size } => search(&store, &gateways, &query, &scope, page, page_size).await?,
        Command::Reindex { kind } => reindex(&store, &gateways, &controller, kind.as_deref()).await?,
        Command::ReindexStatus => reindex_status(&controller),
        Command::EmbedEntity { kind, id } => embed_entity(&store, &gateways, &kind, id).await?,
    }

    Ok(())
}

fn window_config(config: &ChronicleConfig) -> WindowConfig {
    WindowConfig { window_size: config.analysis.window_size, overlap: config.analysis.window_overlap }
}

async fn analyze(
    store: &ArchiveStore,
    gateways: &gateways::Gateways,
    controller: &RunController,
    config: &ChronicleConfig,
    room_id: i64,
    mode: &str,
) -> anyhow::Result<()> {
    let room_id = RoomId(room_id);
    let requested_mode = RunMode::from_str(mode).map_err(anyhow::Error::msg)?;

    let plan = chronicle_analyzer::plan_windows(store, room_id, window_config(config), requested_mode)?;

    if !plan.has_new_messages() {
        // An incremental run with nothing new to classify is a no-op: no run
        // record, no model call (§8).
        println!("{}", serde_json::to_string_pretty(&serde_json::json!({
            "run_id": serde_json::Value::Null,
            "mode": plan.mode.to_string(),
            "discussions_found": 0,
            "windows_processed": 0,
            "total_tokens": 0,
            "no_op": true,
        }))?);
        return Ok(());
    }

    let (start, end, context_start) = plan.bounds();
    let run_id = controller.start_analysis(room_id, plan.mode, start, end, context_start, Some(plan.total_windows() as i64))?;

    match chronicle_analyzer::analyze(store, &gateways.generation, run_id, room_id, &plan).await {
        Ok(outcome) => {
            controller.finish_analysis(room_id, run_id, RunStatus::Completed, None);
            for discussion_id in &outcome.touched_discussions {
                // Best-effort: keep the discussion's embedding from going
                // stale (§2), but a failure here shouldn't fail the run that
                // already committed its analysis results.
                if let Err(e) = chronicle_embeddings::embed_entity(
                    store,
                    &gateways.embedding,
                    EntityKind::Discussion,
                    discussion_id.as_i64(),
                )
                .await
                {
                    tracing::warn!(discussion_id = discussion_id.as_i64(), error = %e, "post-analysis embedding refresh failed");
                }
            }
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({
                "run_id": run_id.as_i64(),
                "mode": outcome.mode.to_string(),
                "discussions_found": outcome.discussions_found,
                "windows_processed": outcome.windows_processed,
                "total_tokens": outcome.total_tokens,
                "start_message_id": outcome.start_message_id.map(|m| m.as_i64()),
                "end_message_id": outcome.end_message_id.map(|m| m.as_i64()),
                "context_start_message_id": outcome.context_start_message_id.map(|m| m.as_i64()),
                "embedded_discussions": outcome.touched_discussions.iter().map(|d| d.as_i64()).collect::<Vec<_>>(),
            }))?);
            Ok(())
        }
        Err(e) => {
            controller.finish_analysis(room_id, run_id, RunStatus::Failed, Some(&e.to_string()));
            Err(e.into())
        }
    }
}

fn analysis_status(store: &ArchiveStore, controller: &RunController, room_id: i64) -> anyhow::Result<()> {
    let room_id = RoomId(room_id);
    let liveness = controller.analysis_liveness(room_id)?;
    let run = store.most_recent_run_for_room(room_id)?;

    let status = match (liveness, &run) {
        (Liveness::WasStale, _) => "stale",
        (_, Some(r)) => match r.status {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Stale => "stale",
        },
        (_, None) => "idle",
    };

    println!("{}", serde_json::to_string_pretty(&serde_json::json!({
        "status": status,
        "run": run.map(|r| serde_json::json!({
            "run_id": r.id.as_i64(),
            "windows_processed": r.windows_processed,
            "total_windows": r.total_windows,
            "discussions_found": r.discussions_found,
            "tokens_used": r.tokens_used,
            "mode": r.mode.to_string(),
            "error": r.error,
        })),
    }))?);
    Ok(())
}

fn preview_incremental(store: &ArchiveStore, config: &ChronicleConfig, room_id: i64) -> anyhow::Result<()> {
    let room_id = RoomId(room_id);
    let plan = chronicle_analyzer::plan_windows(store, room_id, window_config(config), RunMode::Incremental)?;
    let (start, end, context_start) = plan.bounds();
    let last_analysis = store.most_recent_completed_run(room_id)?;

    println!("{}", serde_json::to_string_pretty(&serde_json::json!({
        "incremental_available": matches!(plan.mode, RunMode::Incremental),
        "new_messages": end.map(|_| plan.total_windows()),
        "context_messages": context_start.is_some(),
        "last_analysis": last_analysis.map(|r| serde_json::json!({
            "run_id": r.id.as_i64(),
            "completed_at": r.completed_at.map(|t| t.to_rfc3339()),
            "end_message_id": r.end_message_id.map(|m| m.as_i64()),
        })),
    }))?);
    Ok(())
}

async fn classify_topics(
    store: &ArchiveStore,
    gateways: &gateways::Gateways,
    controller: &RunController,
    room_id: i64,
) -> anyhow::Result<()> {
    controller.try_start_topic_classification()?;
    let result = chronicle_topics::classify_topics(store, &gateways.generation, RoomId(room_id)).await;
    controller.finish_topic_classification();
    let outcome = result?;

    println!("{}", serde_json::to_string_pretty(&serde_json::json!({
        "topics_created": outcome.topics_created.iter().map(|t| t.as_i64()).collect::<Vec<_>>(),
        "discussions_classified": outcome.discussions_classified,
        "topics_deleted": outcome.topics_deleted,
    }))?);
    Ok(())
}

async fn search(
    store: &ArchiveStore,
    gateways: &gateways::Gateways,
    query: &str,
    scope: &str,
    page: usize,
    page_size: usize,
) -> anyhow::Result<()> {
    let scope = SearchScope::from_str(scope).map_err(anyhow::Error::msg)?;
    let mut req = chronicle_search::SearchRequest::new(query, scope);
    req.page = page.max(1);
    req.page_size = page_size.clamp(1, 100);

    let response = chronicle_search::search(store, &gateways.embedding, &req).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn reindex(
    store: &ArchiveStore,
    gateways: &gateways::Gateways,
    controller: &RunController,
    kind: Option<&str>,
) -> anyhow::Result<()> {
    let scope = kind.map(EntityKind::from_str).transpose().map_err(anyhow::Error::msg)?;
    controller.try_start_reindex()?;
    let tracker = chronicle_embeddings::ReindexTracker::new();
    let result = chronicle_embeddings::reindex(store, &gateways.embedding, &tracker, scope).await;
    controller.finish_reindex();
    result?;

    let progress: std::collections::HashMap<String, serde_json::Value> = tracker
        .snapshot()
        .into_iter()
        .map(|(k, p)| (k.to_string(), serde_json::json!({"total": p.total, "completed": p.completed})))
        .collect();
    println!("{}", serde_json::to_string_pretty(&serde_json::json!({"started": true, "progress": progress}))?);
    Ok(())
}

fn reindex_status(controller: &RunController) {
    let running = controller.is_running(JobKind::Reindex);
    println!(
        "{}",
        serde_json::json!({"status": if running { "running" } else { "idle" }})
    );
}

async fn embed_entity(
    store: &ArchiveStore,
    gateways: &gateways::Gateways,
    kind: &str,
    id: i64,
) -> anyhow::Result<()> {
    let kind = EntityKind::from_str(kind).map_err(anyhow::Error::msg)?;
    let status = chronicle_embeddings::embed_entity(store, &gateways.embedding, kind, id).await?;
    let status = match status {
        chronicle_embeddings::EmbedStatus::Embedded => "embedded",
        chronicle_embeddings::EmbedStatus::Unchanged => "unchanged",
        chronicle_embeddings::EmbedStatus::NotFound => "not_found",
    };
    println!("{}", serde_json::json!({"status": status}));
    Ok(())
}
