//! casedeskd — the CaseDesk daemon.
//!
//! Single binary that assembles the assignment core: document store,
//! back-office cache, and assignment service. Subcommands trigger one
//! assignment pass, read the cached workload snapshot, or inspect the
//! audit trail. The HTTP layer of the back office lives elsewhere; this is
//! the operator/scheduled-job surface.
//!
//! # Usage
//!
//! ```text
//! casedeskd --data-dir /var/lib/casedesk assign --policy load_balanced
//! casedeskd --data-dir /var/lib/casedesk stats
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use casedesk_assign::stats::{self, AdminCache};
use casedesk_assign::AssignmentService;
use casedesk_core::{AssignmentPolicy, CasedeskConfig};
use casedesk_store::{DocumentStore, RedbStore, WorkItem, Worker};

#[derive(Parser)]
#[command(name = "casedeskd", about = "CaseDesk assignment daemon")]
struct Cli {
    /// Path to casedesk.toml. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Data directory for the embedded store (overrides the config path).
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one assignment pass.
    Assign {
        /// round_robin or load_balanced; defaults to the configured policy.
        #[arg(long)]
        policy: Option<String>,

        /// Abort cleanly between batch chunks after this many seconds.
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Print the workload snapshot (served from cache when warm).
    Stats,

    /// Print recent assignment audit records, newest first.
    Audits {
        #[arg(long, default_value = "10")]
        limit: u32,
    },

    /// Populate a demo roster and backlog (local experimentation only).
    SeedDemo {
        #[arg(long, default_value = "4")]
        workers: u32,

        #[arg(long, default_value = "24")]
        items: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,casedesk=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => CasedeskConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => CasedeskConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.store.path = dir.join("casedesk.redb");
    }
    if let Some(parent) = config.store.path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }

    let store = Arc::new(RedbStore::open(&config.store.path)?);
    info!(path = ?config.store.path, "document store opened");
    let cache = Arc::new(AdminCache::new(config.cache.max_entries));

    match cli.command {
        Command::Assign {
            policy,
            timeout_secs,
        } => {
            let policy = match policy {
                Some(raw) => raw
                    .parse::<AssignmentPolicy>()
                    .map_err(anyhow::Error::msg)?,
                None => config.assignment.policy,
            };
            let deadline = timeout_secs.map(|secs| Instant::now() + Duration::from_secs(secs));

            let service = AssignmentService::new(
                store.clone() as Arc<dyn DocumentStore>,
                cache,
                config.assignment.clone(),
            );
            match service.run_assignment_with_deadline(policy, deadline).await {
                Ok(report) => {
                    println!(
                        "assigned {} of {} items ({})",
                        report.assigned_count, report.requested, report.policy
                    );
                    let mut per_worker: Vec<_> = report.per_worker.into_iter().collect();
                    per_worker.sort();
                    for (worker_id, count) in per_worker {
                        println!("  {worker_id}: {count}");
                    }
                }
                Err(e) => {
                    anyhow::bail!(
                        "assignment run failed: {e} ({} items assigned before the halt)",
                        e.assigned_count()
                    );
                }
            }
        }

        Command::Stats => {
            let snapshot = stats::workload_stats(
                store.as_ref(),
                &cache,
                config.assignment.workload_scan_cap,
                Duration::from_secs(config.cache.stats_ttl_secs),
            )?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }

        Command::Audits { limit } => {
            for record in store.recent_audits(limit)? {
                println!("{}", serde_json::to_string(&record)?);
            }
        }

        Command::SeedDemo { workers, items } => {
            let now = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            for w in 0..workers {
                store.put_worker(&Worker::active(format!("agent-{w:02}"), now))?;
            }
            for i in 0..items {
                store.put_item(&WorkItem::unassigned(format!("file-{i:04}"), now))?;
            }
            info!(workers, items, "demo data seeded");
            println!("seeded {workers} workers and {items} items");
        }
    }

    Ok(())
}
