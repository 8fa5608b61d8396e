//! salesq CLI: run the service, or inspect tasks in the record store.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use salesq::api::{self, AppState};
use salesq::config::Config;
use salesq::db::Db;
use salesq::engine::{JobQueue, Worker};
use salesq::model::{TaskId, TaskStatus};
use salesq::source::SourceSet;
use salesq::telemetry::{TelemetryConfig, init_telemetry};
use secrecy::ExposeSecret;
use tracing::info;

#[derive(Parser)]
#[command(name = "salesq", about = "Queued extraction of filtered sales records")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API and the background worker
    Serve {
        /// Listen address (overrides BIND_ADDR)
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Task operations
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },
}

#[derive(Subcommand)]
enum TaskAction {
    /// List tasks, newest first
    List {
        /// Only tasks in this status (pending, in_progress, completed, failed)
        #[arg(long)]
        status: Option<String>,
    },
    /// Show a task
    Show {
        /// Task ID
        id: String,
    },
    /// Show the records a task produced
    Records {
        /// Task ID
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Command::Serve { bind } => cmd_serve(config, bind).await,
        Command::Task { action } => {
            let db = Db::connect(config.database_url.expose_secret()).await?;
            db.migrate().await?;

            match action {
                TaskAction::List { status } => cmd_task_list(&db, status).await,
                TaskAction::Show { id } => cmd_task_show(&db, &id).await,
                TaskAction::Records { id } => cmd_task_records(&db, &id).await,
            }
        }
    }
}

async fn cmd_serve(config: Config, bind: Option<SocketAddr>) -> anyhow::Result<()> {
    let telemetry = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "salesq".to_string(),
        default_filter: config.log_level.clone(),
    })?;

    let db = Db::connect(config.database_url.expose_secret()).await?;
    db.migrate().await?;
    let db = Arc::new(db);
    info!("database ready");

    let queue = Arc::new(JobQueue::new());
    let sources = SourceSet::from_paths(&config.source_a_path, &config.source_b_path);
    let worker = Worker::new(
        Arc::clone(&db),
        Arc::clone(&queue),
        sources,
        config.worker_config(),
    );
    let worker_handle = {
        let worker = worker.clone();
        tokio::spawn(async move { worker.run().await })
    };

    let mut state = AppState::new(db, queue);
    if let Some(key) = config.api_key {
        state = state.with_api_key(key);
    }
    let app = api::router(state);

    let addr = bind.unwrap_or(config.bind_addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("shutdown signal received");
        })
        .await?;

    worker.shutdown();
    worker_handle.await?;
    info!("shut down cleanly");
    telemetry.force_flush();
    Ok(())
}

async fn cmd_task_list(db: &Db, status: Option<String>) -> anyhow::Result<()> {
    let tasks = match status {
        Some(s) => {
            let status: TaskStatus = s.parse()?;
            let mut tasks = db.list_tasks_by_status(status).await?;
            tasks.reverse();
            tasks
        }
        None => db.list_tasks().await?,
    };

    if tasks.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<11}  {:<9}  {:<30}  CREATED",
        "ID", "STATUS", "YEARS", "COMPANIES"
    );
    println!("{}", "-".repeat(110));

    for task in &tasks {
        println!(
            "{:<36}  {:<11}  {:<9}  {:<30}  {}",
            task.id,
            task.status,
            format!("{}-{}", task.start_year, task.end_year),
            task.companies.as_deref().unwrap_or("All"),
            task.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    println!("\n{} task(s)", tasks.len());
    Ok(())
}

async fn cmd_task_show(db: &Db, id: &str) -> anyhow::Result<()> {
    let task = db.get_task(id.parse::<TaskId>()?).await?;

    println!("ID:         {}", task.id);
    println!("Status:     {}", task.status);
    println!("Years:      {}-{}", task.start_year, task.end_year);
    println!("Companies:  {}", task.companies.as_deref().unwrap_or("All"));
    println!("Created:    {}", task.created_at.to_rfc3339());
    Ok(())
}

async fn cmd_task_records(db: &Db, id: &str) -> anyhow::Result<()> {
    let records = db.list_records(id.parse::<TaskId>()?).await?;

    if records.is_empty() {
        println!("No records.");
        return Ok(());
    }

    println!(
        "{:<8}  {:<16}  {:<20}  {:<10}  PRICE",
        "ID", "COMPANY", "MODEL", "DATE"
    );
    println!("{}", "-".repeat(72));
    for record in &records {
        println!(
            "{:<8}  {:<16}  {:<20}  {:<10}  {:.2}",
            record.id, record.company, record.car_model, record.sale_date, record.price
        );
    }

    println!("\n{} record(s)", records.len());
    Ok(())
}
