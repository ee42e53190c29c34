use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use discovery_engine::db::Db;
use discovery_engine::{
    CachedContentSource, Config, ContentSource, DiscoveryEngine, DiscoveryServer, DiscoveryTask,
    HttpContentSource,
};
use std::sync::Arc;
use std::time::Duration;

const PROGRESS_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "discover")]
#[command(about = "Seed-driven discovery over a content catalogue")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a discovery run and follow it until it finishes (Ctrl-C cancels)
    Start {
        /// Seed value: a keyword, channel id, item id or item URL
        seed: String,

        /// Seed kind: keyword, channel, item (or video), url
        #[arg(short, long, default_value = "keyword")]
        kind: String,

        /// Node budget (defaults to engine.default_max_total_items)
        #[arg(short, long)]
        max_items: Option<usize>,
    },

    /// Show one task
    Status { task_id: String },

    /// List recent tasks
    List {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        /// Only tasks still marked running
        #[arg(long)]
        incomplete: bool,
    },

    /// Restart a task left running by a previous process and follow it
    Resume { task_id: String },

    /// Mark a task cancelled
    Cancel { task_id: String },

    /// Print the expansion trail of a task
    Nodes { task_id: String },

    /// Serve the HTTP API
    Serve {
        /// Overrides http_server.port
        #[arg(short, long)]
        port: Option<u16>,
    },
}

/// Build the configured content source with an optional LRU item cache.
fn build_source(config: &Config) -> Result<Arc<dyn ContentSource>> {
    let cs = &config.content_source;
    let api_key = cs.api_key();
    if api_key.is_none() {
        log::warn!(
            "Environment variable {} not set; calling the content source without credentials",
            cs.api_key_env
        );
    }

    let http = HttpContentSource::new(&cs.base_url, api_key, cs.timeout(), cs.max_retries, cs.page_size)
        .context("Failed to build content source")?;
    let http: Arc<dyn ContentSource> = Arc::new(http);

    if cs.cache_capacity > 0 {
        Ok(Arc::new(CachedContentSource::new(http, cs.cache_capacity)))
    } else {
        Ok(http)
    }
}

async fn build_engine(config: &Config) -> Result<DiscoveryEngine> {
    let db = Db::new(config.db_path());
    db.initialize().await.context("Failed to initialize database")?;
    log::info!("Database initialized: {}", config.db_path().display());

    let source = build_source(config)?;
    Ok(DiscoveryEngine::new(
        db,
        source,
        config.engine.traversal_settings(),
        config.engine.node_delay(),
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.discovery.log_level.as_str()),
    )
    .init();

    let engine = build_engine(&config).await?;

    match args.command {
        Command::Start { seed, kind, max_items } => {
            let max_items = max_items.unwrap_or(config.engine.default_max_total_items);
            let task_id = engine.start_discovery(&seed, &kind, max_items).await?;
            println!("Started task {}", task_id);
            follow(&engine, &task_id).await?;
        }
        Command::Status { task_id } => {
            let task = engine.get_task(&task_id).await?;
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        Command::List { limit, incomplete } => {
            let tasks = if incomplete {
                engine.list_incomplete_tasks().await?
            } else {
                engine.list_tasks(limit).await?
            };
            if tasks.is_empty() {
                println!("No tasks");
            }
            for task in &tasks {
                print_summary(task);
            }
        }
        Command::Resume { task_id } => {
            engine.resume_task(&task_id).await?;
            println!("Resumed task {}", task_id);
            follow(&engine, &task_id).await?;
        }
        Command::Cancel { task_id } => {
            if engine.cancel(&task_id).await? {
                println!("Cancelled task {}", task_id);
            } else {
                println!("Task {} already finished", task_id);
            }
        }
        Command::Nodes { task_id } => {
            engine.get_task(&task_id).await?;
            for record in engine.node_trail(&task_id).await? {
                println!(
                    "{}  depth={}  discovered={}  {}",
                    record.processed_at, record.depth, record.discovered_count, record.node_id
                );
            }
        }
        Command::Serve { port } => {
            let port = port.unwrap_or(config.http_server.port);
            log::info!("Starting Discovery Engine HTTP API v{}", env!("CARGO_PKG_VERSION"));
            let server = DiscoveryServer::new(
                engine,
                config.engine.default_max_total_items,
                config.http_server.allowed_origins.clone(),
            );
            server.run(port).await?;
        }
    }

    Ok(())
}

/// Print progress until the task is terminal; Ctrl-C requests cancellation.
async fn follow(engine: &DiscoveryEngine, task_id: &str) -> Result<()> {
    let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
    let mut cancel_requested = false;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            result = tokio::signal::ctrl_c(), if !cancel_requested => {
                result.context("Failed to listen for Ctrl-C")?;
                log::info!("Cancelling task {}", task_id);
                engine.cancel(task_id).await?;
                cancel_requested = true;
            }
        }

        let task = engine.get_task(task_id).await?;
        if task.status.is_terminal() && !engine.is_running(task_id) {
            print_summary(&task);
            if let Some(err) = &task.error_message {
                anyhow::bail!("Task {} failed: {}", task_id, err);
            }
            return Ok(());
        }
        log::info!(
            "Task {}: {} processed, frontier {}, last {}",
            task_id,
            task.processed_count,
            task.frontier_size,
            task.last_processed_node.as_deref().unwrap_or("-")
        );
    }
}

fn print_summary(task: &DiscoveryTask) {
    println!(
        "{}  {:<9}  {}:{}  {}  processed={}/{}  started={}",
        task.task_id,
        task.status.as_str(),
        task.seed_kind,
        task.seed,
        task.mode,
        task.processed_count,
        task.max_total_items,
        task.start_time
    );
}
