//! `clearance-cli` – PPE Clearance Gate Command Line Interface
//!
//! This binary is the operator's entry point for the clearance gate.  It:
//!
//! 1. Loads `~/.clearance/config.toml`, writing the defaults on first run.
//! 2. Opens the event journal and verifies the detector's status database.
//! 3. Spawns the poll loop that feeds status snapshots into the stage
//!    controller.
//! 4. Drops the operator into an **interactive REPL** with slash-commands
//!    (`/status`, `/pass`, `/reset`, `/logs`, `/history`, `/settings`).
//! 5. Intercepts **Ctrl-C** to record the shutdown and exit.

mod config;
mod repl;

use chrono::Utc;
use clearance_kernel::{EventLog, StageController};
use clearance_memory::{Journal, SqliteStatusStore};
use clearance_runtime::{Poller, TracerProviderGuard, init_tracing, share};
use clearance_types::{LogEvent, Severity};
use colored::Colorize;
use std::path::Path;
use std::process;
use std::sync::{Arc, Mutex, PoisonError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, info, warn};

use config::Config;

fn main() {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG selects the filter (default "info"), CLEARANCE_LOG_FORMAT=json
    // switches to newline-delimited JSON.  User-facing output stays println!.
    // Shared with the Ctrl-C handler, which must flush before exiting.
    let telemetry = Arc::new(Mutex::new(init_tracing("clearance")));

    print_banner();

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = load_config();
    let policy = cfg.timeout_policy().unwrap_or_else(|e| fatal(&e.to_string()));
    let interval = cfg.refresh_interval().unwrap_or_else(|e| fatal(&e.to_string()));

    // ── Event journal ─────────────────────────────────────────────────────
    let journal = match Journal::open(&cfg.log_dir) {
        Ok(j) => Arc::new(j),
        Err(e) => fatal(&e.to_string()),
    };
    let log: Arc<dyn EventLog> = journal.clone();

    // ── Status database ───────────────────────────────────────────────────
    let source = open_status_store(&cfg.db_path, log.as_ref());
    let view = match SqliteStatusStore::open_read_only(&cfg.db_path) {
        Ok(store) => Some(store),
        Err(e) => {
            warn!(error = %e, "second status connection unavailable; /status shows no readings");
            None
        }
    };

    log.record(LogEvent::new(
        Severity::Info,
        "PPE clearance system started",
        Utc::now(),
    ));

    let controller = share(StageController::new(policy, log.clone()));
    let poller = match Poller::new(source, controller.clone(), log.clone(), interval) {
        Ok(p) => p,
        Err(e) => fatal(&e.to_string()),
    };

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    // The REPL is blocked on stdin, so the handler records the shutdown,
    // flushes pending spans and exits the process itself.
    let shutdown_ctrlc = shutdown.clone();
    let log_ctrlc = log.clone();
    let telemetry_ctrlc = telemetry.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
        shutdown_ctrlc.store(true, Ordering::SeqCst);
        log_ctrlc.record(LogEvent::new(
            Severity::Info,
            "PPE clearance system stopped by operator",
            Utc::now(),
        ));
        flush_telemetry(&telemetry_ctrlc);
        println!("{}", "  ✓ Exiting clearance gate.".green());
        process::exit(0);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; use /quit to exit");
    }

    // ── Poll loop ─────────────────────────────────────────────────────────
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => fatal(&format!("Failed to start async runtime: {e}")),
    };
    runtime.spawn(poller.run(shutdown.clone()));
    info!(
        db = %cfg.db_path,
        interval_secs = cfg.refresh_interval_secs,
        "monitoring started"
    );

    println!(
        "  Monitoring {} every {}s.",
        cfg.db_path.bold(),
        cfg.refresh_interval_secs
    );
    println!(
        "  Type {} for a list of commands.\n",
        "/help".bold().cyan()
    );

    // ── Interactive REPL ──────────────────────────────────────────────────
    let console = repl::Console::new(controller, journal, view, cfg);
    repl::run(shutdown.clone(), console);

    shutdown.store(true, Ordering::SeqCst);
    log.record(LogEvent::new(
        Severity::Info,
        "PPE clearance system stopped",
        Utc::now(),
    ));
    runtime.shutdown_timeout(Duration::from_secs(2));
    flush_telemetry(&telemetry);
}

/// Flush pending spans; the handler's clone keeps the guard alive past `main`.
fn flush_telemetry(telemetry: &Mutex<TracerProviderGuard>) {
    telemetry
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .shutdown();
}

// ─────────────────────────────────────────────────────────────────────────────
// Startup
// ─────────────────────────────────────────────────────────────────────────────

/// Load the config, writing the defaults on first run.
fn load_config() -> Config {
    match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let defaults = Config::default();
            match config::save(&defaults) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Error saving config".red(), e),
            }
            let mut cfg = defaults;
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    }
}

/// Attach read-only to the detector's status database, aborting with an ERROR
/// event when it is missing or has no status table.
fn open_status_store(db_path: &str, log: &dyn EventLog) -> SqliteStatusStore {
    if !Path::new(db_path).exists() {
        abort_unavailable(log, &format!("{db_path} does not exist"));
    }
    let store = match SqliteStatusStore::open_read_only(db_path) {
        Ok(store) => store,
        Err(e) => abort_unavailable(log, &e.to_string()),
    };
    match store.fetch() {
        Ok(_) => {}
        // The detector may not have written its first row yet.
        Err(e) if e.is_missing_row() => warn!(error = %e, "status row not written yet"),
        Err(e) => abort_unavailable(log, &e.to_string()),
    }
    store
}

fn abort_unavailable(log: &dyn EventLog, reason: &str) -> ! {
    let msg = format!("Status database unavailable: {reason}");
    log.record(LogEvent::new(Severity::Error, msg.clone(), Utc::now()));
    fatal(&msg)
}

fn fatal(msg: &str) -> ! {
    error!("{msg}");
    eprintln!("{}: {}", "Fatal".red().bold(), msg);
    process::exit(1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║        PPE Clearance Gate            ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!(
        "  {} {}",
        "clearance".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Staged protective-equipment checks");
    println!();
}
