//! Interactive front end for a warm Claude Code session.
//!
//! Reads one prompt per line from stdin and prints each completion on
//! stdout. Lines starting with ':' control the pool:
//!
//! ```text
//! :model <name>   switch models (recycles the session)
//! :recycle        replace the session
//! :stats          print pool counters
//! :activity       print recent session activity
//! ```

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use kodegen_claude_pool::{CommandPool, PoolConfig, PoolState, PromptOptions, ReplyOutcome};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, Parser)]
#[command(name = "kodegen-claude-pool", version, about = "Low-latency completions from a warm Claude Code session")]
struct Args {
    /// Model the session starts with
    #[arg(long)]
    model: Option<String>,

    /// Per-prompt timeout in milliseconds
    #[arg(long, default_value_t = 15_000)]
    timeout_ms: u64,

    /// Path to the `claude` binary (searched for when omitted)
    #[arg(long)]
    cli_path: Option<PathBuf>,

    /// Working directory for the CLI
    #[arg(long)]
    cwd: Option<PathBuf>,

    /// JSON file with pool configuration
    #[arg(long)]
    config: Option<PathBuf>,
}

fn load_config(args: &Args) -> Result<PoolConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            PoolConfig::from_json(&json)?
        }
        None => PoolConfig::default(),
    };

    if let Some(model) = &args.model {
        config.model.clone_from(model);
    }
    if let Some(cwd) = &args.cwd {
        config.cwd = Some(cwd.clone());
    }
    Ok(config)
}

async fn handle_command(pool: &CommandPool, command: &str) -> Result<()> {
    let mut parts = command.split_whitespace();
    match parts.next() {
        Some("model") => match parts.next() {
            Some(model) => {
                pool.update_model(model);
                let state = pool.wait_settled().await;
                println!("model {model}: {state}");
            }
            None => println!("usage: :model <name>"),
        },
        Some("recycle") => {
            pool.recycle_all().await?;
            println!("recycled");
        }
        Some("stats") => println!("{:#?}", pool.stats()),
        Some("activity") => {
            for activity in pool.recent_activity() {
                println!("{:?}: {}", activity.kind, activity.detail);
            }
        }
        _ => println!("commands: :model <name>, :recycle, :stats, :activity"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let timeout = Duration::from_millis(args.timeout_ms);

    let pool = CommandPool::with_cli(config, args.cli_path.clone())?;

    let started = Instant::now();
    pool.activate().await.context("Failed to warm up Claude Code")?;
    log::info!(
        "Session ready on {} after {:?}",
        pool.active_model().unwrap_or_default(),
        started.elapsed()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix(':') {
            if let Err(e) = handle_command(&pool, command).await {
                eprintln!("error: {e}");
            }
            continue;
        }

        // Recover from a dead session before giving up on the line
        if pool.state() == PoolState::Unavailable {
            pool.activate().await.ok();
        }

        let started = Instant::now();
        let reply = pool
            .send_prompt(line, PromptOptions::default().with_timeout(timeout))
            .await;

        match (reply.outcome, reply.text) {
            (ReplyOutcome::Completed, Some(text)) => println!("{text}"),
            (ReplyOutcome::Completed, None) => println!(),
            (outcome, _) => eprintln!("no completion: {outcome:?}"),
        }
        log::info!("Prompt answered in {:?}", started.elapsed());
    }

    pool.dispose();
    Ok(())
}
