//! txwatch CLI: follow a transaction's confirmation from the terminal.
//!
//! Usage:
//! ```bash
//! # Watch a transaction until it is confirmed and recorded
//! txwatch watch --url https://api.example.com --tx <64-hex-hash> --type task_submit
//!
//! # Fetch its current status once
//! txwatch status --url https://api.example.com --tx <64-hex-hash>
//! ```

mod logging;

use std::env;
use std::fs;
use std::process;
use std::sync::Arc;

use serde::Deserialize;

use txwatch_core::{
    NotificationKind, NotificationTemplate, StatusSource, TracingNotifier, TxHash, TxRegistry,
    TxType, WatcherConfig,
};
use txwatch_http::{HttpSourceConfig, HttpStatusSource};

use crate::logging::{init_tracing, LogConfig};

/// Optional JSON file passed with `--config`.
#[derive(Debug, Default, Deserialize)]
struct CliConfig {
    #[serde(default)]
    watcher: WatcherConfig,
    #[serde(default)]
    http: HttpSourceConfig,
    #[serde(default)]
    log: LogConfig,
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "watch" => cmd_watch(&args[2..]).await,
        "status" => cmd_status(&args[2..]).await,
        "version" | "--version" | "-V" => {
            println!("txwatch {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn print_usage() {
    println!("txwatch {}", env!("CARGO_PKG_VERSION"));
    println!("Follow blockchain transaction confirmation\n");
    println!("USAGE:");
    println!("    txwatch <COMMAND>\n");
    println!("COMMANDS:");
    println!("    watch      Watch a transaction until it reaches a terminal state");
    println!("    status     Fetch a transaction's current status once");
    println!("    version    Print version");
    println!("    help       Print this help\n");
    println!("FLAGS:");
    println!("    --url <URL>       API base URL                 [required]");
    println!("    --tx <HASH>       64-hex transaction hash      [required]");
    println!("    --type <TYPE>     Transaction type tag         [watch, default: transaction]");
    println!("    --token <TOKEN>   Bearer token");
    println!("    --config <FILE>   JSON config (watcher, http, log sections)");
    println!("    --log <LEVEL>     Log level override");
    println!("    --json            JSON log output");
}

fn load_config(args: &[String]) -> Result<CliConfig, String> {
    let mut config = match parse_flag(args, "--config") {
        Some(path) => {
            let raw = fs::read_to_string(&path).map_err(|e| format!("{path}: {e}"))?;
            serde_json::from_str(&raw).map_err(|e| format!("{path}: {e}"))?
        }
        None => CliConfig::default(),
    };
    if let Some(level) = parse_flag(args, "--log") {
        config.log.level = level;
    }
    if has_flag(args, "--json") {
        config.log.json = true;
    }
    Ok(config)
}

fn parse_tx_hash(args: &[String]) -> Result<TxHash, String> {
    let raw = parse_flag(args, "--tx").ok_or("--tx is required")?;
    TxHash::parse(&raw).map_err(|e| e.to_string())
}

async fn cmd_watch(args: &[String]) -> Result<(), String> {
    let url = parse_flag(args, "--url").ok_or("--url is required")?;
    let tx_hash = parse_tx_hash(args)?;
    let tx_type = TxType::new(parse_flag(args, "--type").unwrap_or_else(|| "transaction".into()));
    let config = load_config(args)?;
    init_tracing(&config.log);

    let source = HttpStatusSource::new(&url, config.http).map_err(|e| e.to_string())?;
    let registry = TxRegistry::new(Arc::new(source), Arc::new(TracingNotifier), config.watcher);
    registry.update_auth_token(parse_flag(args, "--token"));
    let sweeper = registry.spawn_sweeper();
    tracing::debug!(?registry, "registry ready");

    let template = NotificationTemplate {
        success_title: "Transaction confirmed".into(),
        success_description: format!("{tx_type} transaction is on-chain and recorded."),
        error_title: "Transaction failed".into(),
        error_description: None,
    };
    registry.register(tx_hash.clone(), tx_type, template);
    let mut observer = registry
        .observe(&tx_hash)
        .ok_or("transaction was not registered")?;

    println!("Watching {tx_hash} via {url}...");
    tracing::info!(tx_hash = %tx_hash, url = %url, "watch started");

    let outcome = tokio::select! {
        status = observer.wait_terminal() => status,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!(tx_hash = %tx_hash, "interrupted");
            None
        }
    };

    let result = match outcome {
        None => Err("watch ended before a terminal status".to_string()),
        Some(status) => {
            tracing::debug!(tx_hash = %tx_hash, state = %status.state, "watch finished");
            println!("  State:        {}", status.state);
            if let Some(at) = &status.confirmed_at {
                println!("  Confirmed at: {at}");
            }
            match observer.claim_notification() {
                Some(n) if n.kind == NotificationKind::Success => {
                    println!("  {}", n.title);
                    if let Some(description) = &n.description {
                        println!("  {description}");
                    }
                    Ok(())
                }
                Some(n) => Err(match n.description {
                    Some(description) => format!("{}: {description}", n.title),
                    None => n.title,
                }),
                None if status.state.is_success() => Ok(()),
                None => Err(format!("transaction {}", status.state)),
            }
        }
    };

    drop(observer);
    registry.dispose();
    if let Err(e) = sweeper.await {
        tracing::warn!(error = %e, "sweeper task failed");
    }
    result
}

async fn cmd_status(args: &[String]) -> Result<(), String> {
    let url = parse_flag(args, "--url").ok_or("--url is required")?;
    let tx_hash = parse_tx_hash(args)?;
    let config = load_config(args)?;
    init_tracing(&config.log);

    let source = HttpStatusSource::new(&url, config.http).map_err(|e| e.to_string())?;
    let token = parse_flag(args, "--token");
    tracing::debug!(tx_hash = %tx_hash, url = %url, authenticated = token.is_some(), "fetching status");
    let status = source
        .fetch_status(&tx_hash, token.as_deref())
        .await
        .map_err(|e| e.to_string())?;

    println!("{}", serde_json::to_string_pretty(&status).unwrap_or_default());
    Ok(())
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).cloned()
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}
