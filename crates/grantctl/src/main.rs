//! grantctl - grantwatch CLI
//!
//! Inspect, request and wait for the permissions a privileged desktop
//! utility needs. Output is JSON for easy scripting.

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use grantwatch::prelude::*;
use grantwatch::{CapabilitySnapshot, CoordinatorSnapshot};

#[derive(Parser)]
#[command(name = "grantctl")]
#[command(about = "grantwatch - track macOS privacy permissions")]
#[command(version)]
struct Cli {
    /// Re-check period in milliseconds
    #[arg(long, global = true, default_value = "1000")]
    interval_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show every permission and the aggregate state
    Status,
    /// Start the consent flow for one permission
    Request {
        kind: CapabilityKind,
    },
    /// Block until a permission is granted
    Wait {
        kind: CapabilityKind,
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Print transitions as JSON lines until Ctrl+C
    Watch,
}

#[derive(Serialize)]
struct Output<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<Error>,
}

impl<T: Serialize> Output<T> {
    fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }
    fn err(e: Error) -> Output<()> {
        Output { success: false, data: None, error: Some(e) }
    }
}

fn print_json<T: Serialize>(output: &T) {
    match serde_json::to_string_pretty(output) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("failed to serialize output: {}", e),
    }
}

fn print_line<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("failed to serialize event: {}", e),
    }
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum WatchEvent {
    Capability {
        kind: CapabilityKind,
        granted: bool,
        at: chrono::DateTime<chrono::Utc>,
    },
    Aggregate {
        state: AggregateState,
        at: chrono::DateTime<chrono::Utc>,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,grantwatch=info,grantwatch_core=info".into()),
        )
        .init();
}

// ── Main ────────────────────────────────────────────────────────────────────

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let config = MonitorConfig::default().poll_interval(Duration::from_millis(cli.interval_ms.max(1)));
    tracing::debug!(interval_ms = cli.interval_ms, "starting coordinator");
    let hooks = Hooks::new(config.clone());
    let reactivation = hooks.reactivation.clone();
    let coordinator = Coordinator::new(hooks);

    let result = match cli.command {
        Commands::Status => cmd_status(&coordinator),
        Commands::Request { kind } => cmd_request(&coordinator, kind),
        Commands::Wait { kind, timeout_ms } => cmd_wait(&coordinator, kind, timeout_ms),
        Commands::Watch => cmd_watch(&coordinator, reactivation, config.activation_poll),
    };

    coordinator.stop_all();

    if let Err(e) = result {
        let err = match e.downcast::<Error>() {
            Ok(err) => err,
            Err(other) => Error::from(other),
        };
        print_json(&Output::<()>::err(err));
        std::process::exit(1);
    }
}

fn capability(coordinator: &Coordinator, kind: CapabilityKind) -> Result<&Arc<Capability>> {
    coordinator
        .capability(kind)
        .ok_or_else(|| anyhow::anyhow!("no {} capability configured", kind))
}

fn cmd_status(coordinator: &Coordinator) -> Result<()> {
    coordinator.refresh_all();
    let snapshot: CoordinatorSnapshot = coordinator.snapshot();
    print_json(&Output::ok(snapshot));
    Ok(())
}

fn cmd_request(coordinator: &Coordinator, kind: CapabilityKind) -> Result<()> {
    let cap = capability(coordinator, kind)?;
    let already = cap.is_granted();
    cap.request_access();
    cap.refresh();
    let snapshot: CapabilitySnapshot = cap.snapshot();
    print_json(&Output::ok(serde_json::json!({
        "requested": !already,
        "capability": snapshot,
    })));
    Ok(())
}

fn cmd_wait(coordinator: &Coordinator, kind: CapabilityKind, timeout_ms: Option<u64>) -> Result<()> {
    let cap = capability(coordinator, kind)?;
    if !cap.is_granted() {
        eprintln!("Waiting for {} permission...", cap.title());
    }
    grantwatch::wait_granted(cap, timeout_ms.map(Duration::from_millis))?;
    print_json(&Output::ok(cap.snapshot()));
    Ok(())
}

fn cmd_watch(coordinator: &Coordinator, reactivation: Reactivation, activation_poll: Duration) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || { r.store(false, Ordering::SeqCst); })?;

    let watcher = ActivationWatcher::spawn(reactivation, activation_poll);

    print_line(&WatchEvent::Aggregate { state: coordinator.aggregate_state(), at: chrono::Utc::now() });

    let mut subs = Vec::new();
    for cap in coordinator.all_capabilities() {
        let kind = cap.kind();
        subs.push(cap.subscribe(move |granted| {
            print_line(&WatchEvent::Capability { kind, granted, at: chrono::Utc::now() });
        }));
    }
    subs.push(coordinator.subscribe(|state| {
        print_line(&WatchEvent::Aggregate { state, at: chrono::Utc::now() });
    }));

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(50));
    }

    drop(subs);
    watcher.stop();
    eprintln!("Stopped.");
    Ok(())
}
