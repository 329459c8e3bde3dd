//! CLI command definitions for dynq.
//!
//! Four commands cover the queue lifecycle end to end: `push` fills a queue,
//! `activate` hands it to a group, `work` drains the group, and `stats`
//! shows where a group stands.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::policy::{PolicyKind, PriorityDirection};
use crate::registry::DEFAULT_PARAMETER;
use crate::scheduler::{QueueTarget, Scheduler, SchedulerConfig};
use crate::store::RedisStore;
use crate::worker::{JobHandler, Worker, WorkerStats};

/// Default store connection URL.
const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";

/// Dynamic weighted multi-queue scheduler.
#[derive(Parser)]
#[command(name = "dynq")]
#[command(about = "Dynamic weighted multi-queue scheduling over Redis")]
#[command(version)]
#[command(
    long_about = "dynq schedules work across queues that are created, drained, and retired on the fly.\n\nFill a queue with push, close it with activate, then drain its group with work.\nActivated queues accept no further pushes and disappear once empty.\n\nExample usage:\n  dynq push --queue invoices 'payload-1'\n  dynq activate --group billing --queue invoices --parameter 0.5\n  dynq work --target @billing --count 4"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Drain a queue group with one or more workers.
    Work(WorkArgs),

    /// Activate a filled queue into a queue group.
    ///
    /// Call this once every initial item has been pushed. Activation closes
    /// the queue: later pushes fail, and the queue is retired automatically
    /// when a worker drains its last item.
    Activate(ActivateArgs),

    /// Push payloads onto a queue that has not been activated yet.
    Push(PushArgs),

    /// Show the active queues of a group with their counters.
    Stats(StatsArgs),
}

/// Arguments for `dynq work`.
#[derive(Parser, Debug)]
pub struct WorkArgs {
    /// Queue group to drain, prefixed with @, as in @mailings.
    #[arg(short, long, env = "DYNQ_TARGET")]
    pub target: String,

    /// Number of worker tasks to run.
    #[arg(short = 'n', long, default_value = "1")]
    pub count: usize,

    /// Seconds to sleep when no work is available.
    #[arg(short, long, default_value = "5")]
    pub interval: u64,

    /// Selection policy (priority-score, weighted-random, throughput-speed).
    #[arg(short, long, default_value = "weighted-random")]
    pub policy: PolicyKind,

    /// Queue names fetched per selection cycle.
    #[arg(long, default_value = "1")]
    pub number_of_queues: usize,

    /// Weighted-draw attempts before settling on the last draw
    /// (weighted-random only).
    #[arg(long, default_value = "20")]
    pub random_attempts: u32,

    /// Fraction of selections biased toward brand-new queues
    /// (weighted-random only).
    #[arg(long, default_value = "0.5")]
    pub quick_start_factor: f64,

    /// Whether the best or the worst score wins (priority-score only).
    #[arg(long, default_value = "highest-first")]
    pub priority_direction: PriorityDirection,

    /// Redis connection URL.
    #[arg(long, env = "DYNQ_REDIS_URL", default_value = DEFAULT_REDIS_URL)]
    pub redis_url: String,
}

/// Arguments for `dynq activate`.
#[derive(Parser, Debug)]
pub struct ActivateArgs {
    /// Queue group receiving the queue.
    #[arg(short, long)]
    pub group: String,

    /// Queue to activate.
    #[arg(short, long)]
    pub queue: String,

    /// Policy parameter: selection probability, priority weight, or
    /// declared speed, depending on the deployment's policy.
    #[arg(short, long, default_value = "1.0")]
    pub parameter: f64,

    /// Selection policy the deployment runs. Controls whether activation
    /// also feeds the quick-start list.
    #[arg(long, default_value = "weighted-random")]
    pub policy: PolicyKind,

    /// Redis connection URL.
    #[arg(long, env = "DYNQ_REDIS_URL", default_value = DEFAULT_REDIS_URL)]
    pub redis_url: String,
}

/// Arguments for `dynq push`.
#[derive(Parser, Debug)]
pub struct PushArgs {
    /// Queue receiving the payload.
    #[arg(short, long)]
    pub queue: String,

    /// Payload to enqueue.
    pub payload: String,

    /// Push the payload this many times.
    #[arg(short, long, default_value = "1")]
    pub repeat: usize,

    /// Redis connection URL.
    #[arg(long, env = "DYNQ_REDIS_URL", default_value = DEFAULT_REDIS_URL)]
    pub redis_url: String,
}

/// Arguments for `dynq stats`.
#[derive(Parser, Debug)]
pub struct StatsArgs {
    /// Queue group to inspect.
    #[arg(short, long)]
    pub group: String,

    /// Redis connection URL.
    #[arg(long, env = "DYNQ_REDIS_URL", default_value = DEFAULT_REDIS_URL)]
    pub redis_url: String,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before
/// running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Work(args) => {
            run_work_command(args).await?;
        }
        Commands::Activate(args) => {
            run_activate_command(args).await?;
        }
        Commands::Push(args) => {
            run_push_command(args).await?;
        }
        Commands::Stats(args) => {
            run_stats_command(args).await?;
        }
    }
    Ok(())
}

/// Handler backing the `work` command: logs every payload it receives.
struct LogHandler;

#[async_trait::async_trait]
impl JobHandler for LogHandler {
    async fn handle(&self, queue: &str, payload: String) -> anyhow::Result<()> {
        info!(queue = %queue, payload = %payload, "Processed item");
        Ok(())
    }
}

async fn run_work_command(args: WorkArgs) -> anyhow::Result<()> {
    let target = QueueTarget::parse(&args.target);
    let config = SchedulerConfig::new()
        .with_policy(args.policy)
        .with_number_of_queues(args.number_of_queues)
        .with_random_attempts(args.random_attempts)
        .with_quick_start_factor(args.quick_start_factor)
        .with_priority_direction(args.priority_direction);

    let store = Arc::new(RedisStore::connect(&args.redis_url).await?);
    let scheduler = Arc::new(Scheduler::new(store, config));
    let handler: Arc<dyn JobHandler> = Arc::new(LogHandler);
    let stats = Arc::new(WorkerStats::new());
    let (shutdown_tx, _) = broadcast::channel(1);

    let mut handles = Vec::with_capacity(args.count);
    for i in 0..args.count {
        let worker = Worker::new(
            format!("worker-{}", i),
            Arc::clone(&scheduler),
            target.clone(),
            Arc::clone(&handler),
            shutdown_tx.subscribe(),
            Duration::from_secs(args.interval),
            Arc::clone(&stats),
        )?;
        handles.push(tokio::spawn(worker.run()));
    }

    info!(
        workers = args.count,
        target = %target,
        policy = %args.policy,
        "Workers running, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    // Ignore send errors: every worker may have stopped already
    let _ = shutdown_tx.send(());
    for result in futures::future::join_all(handles).await {
        if let Err(e) = result {
            error!(error = %e, "Worker task panicked");
        }
    }

    let snapshot = stats.snapshot();
    println!(
        "handled: {}  failures: {}  selection misses: {}",
        snapshot.handled, snapshot.failures, snapshot.misses
    );
    Ok(())
}

async fn run_activate_command(args: ActivateArgs) -> anyhow::Result<()> {
    let store = Arc::new(RedisStore::connect(&args.redis_url).await?);
    let scheduler = Scheduler::new(store, SchedulerConfig::new().with_policy(args.policy));

    scheduler
        .activate(&args.group, &args.queue, args.parameter)
        .await?;
    let length = scheduler.queue_len(&args.queue).await?;

    info!(
        group = %args.group,
        queue = %args.queue,
        parameter = args.parameter,
        length,
        "Queue activated"
    );
    println!(
        "Activated '{}' into group '{}' with {} queued item(s)",
        args.queue, args.group, length
    );
    Ok(())
}

async fn run_push_command(args: PushArgs) -> anyhow::Result<()> {
    let store = Arc::new(RedisStore::connect(&args.redis_url).await?);
    let scheduler = Scheduler::new(store, SchedulerConfig::default());

    for _ in 0..args.repeat {
        scheduler.guarded_push(&args.queue, &args.payload).await?;
    }
    let length = scheduler.queue_len(&args.queue).await?;

    println!("Queue '{}' now holds {} item(s)", args.queue, length);
    Ok(())
}

async fn run_stats_command(args: StatsArgs) -> anyhow::Result<()> {
    let store = Arc::new(RedisStore::connect(&args.redis_url).await?);
    let scheduler = Scheduler::new(store, SchedulerConfig::default());

    let members = scheduler.group_members(&args.group).await?;
    if members.is_empty() {
        println!("Group '{}' has no active queues", args.group);
        return Ok(());
    }

    println!(
        "{:<24} {:>8} {:>8} {:>12}",
        "queue", "items", "worked", "parameter"
    );
    for queue in members {
        let length = scheduler.queue_len(&queue).await?;
        let worked = scheduler
            .registry()
            .units_worked(&queue)
            .await?
            .unwrap_or(0);
        let parameter = scheduler
            .registry()
            .meta(&queue)
            .await?
            .map(|m| m.param)
            .unwrap_or(DEFAULT_PARAMETER);
        println!("{:<24} {:>8} {:>8} {:>12}", queue, length, worked, parameter);
    }
    Ok(())
}
