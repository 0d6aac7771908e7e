//! REPL – the operator console.
//!
//! Supported slash-commands:
//!   /help            – show this list
//!   /status          – current stage, timers and equipment readings
//!   /pass            – manually pass the current stage
//!   /reset           – reset the checklist to idle
//!   /logs            – recent events
//!   /history [file]  – list journal files, or show the tail of one
//!   /settings        – show the effective configuration
//!   /quit | /exit    – gracefully exit the CLI

use chrono::{DateTime, Local, Utc};
use clearance_kernel::{StageState, TimeoutPolicy};
use clearance_memory::{HISTORY_TAIL_LINES, Journal, SqliteStatusStore};
use clearance_runtime::{SharedController, lock};
use clearance_types::{STAGE_DEFINITIONS, Stage, StatusSnapshot};
use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::config::{self, Config};

/// Reason recorded when the operator resets the checklist.
pub const MANUAL_RESET_REASON: &str = "manual reset";

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Status,
    Pass,
    Reset,
    Logs,
    History(Option<String>),
    Settings,
    Quit,
    Unknown(String),
}

/// Whether the REPL keeps reading after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Parse one input line.  Returns `None` for blank input.
pub fn parse(line: &str) -> Option<Command> {
    let mut parts = line.split_whitespace();
    let head = parts.next()?;
    let command = match head {
        "/help" => Command::Help,
        "/status" => Command::Status,
        "/pass" => Command::Pass,
        "/reset" => Command::Reset,
        "/logs" => Command::Logs,
        "/history" => Command::History(parts.next().map(str::to_string)),
        "/settings" => Command::Settings,
        "/quit" | "/exit" => Command::Quit,
        _ => Command::Unknown(line.trim().to_string()),
    };
    Some(command)
}

// ─────────────────────────────────────────────────────────────────────────────
// Console
// ─────────────────────────────────────────────────────────────────────────────

/// Everything the console commands operate on.
pub struct Console {
    controller: SharedController,
    journal: Arc<Journal>,
    /// Separate read connection used to display the latest readings.
    status: Option<SqliteStatusStore>,
    config: Config,
}

impl Console {
    pub fn new(
        controller: SharedController,
        journal: Arc<Journal>,
        status: Option<SqliteStatusStore>,
        config: Config,
    ) -> Self {
        Self {
            controller,
            journal,
            status,
            config,
        }
    }

    /// Execute `command`, writing user-facing output to `out`.
    pub fn execute(&self, command: Command, out: &mut dyn Write) -> io::Result<Flow> {
        match command {
            Command::Help => cmd_help(out)?,
            Command::Status => self.cmd_status(out)?,
            Command::Pass => self.cmd_pass(out)?,
            Command::Reset => self.cmd_reset(out)?,
            Command::Logs => self.cmd_logs(out)?,
            Command::History(file) => self.cmd_history(file.as_deref(), out)?,
            Command::Settings => self.cmd_settings(out)?,
            Command::Quit => {
                writeln!(out, "{}", "Goodbye.".green())?;
                return Ok(Flow::Quit);
            }
            Command::Unknown(other) => {
                writeln!(
                    out,
                    "{} '{}'. Type {} for available commands.",
                    "Unknown command:".red(),
                    other.yellow(),
                    "/help".bold()
                )?;
            }
        }
        Ok(Flow::Continue)
    }

    fn cmd_status(&self, out: &mut dyn Write) -> io::Result<()> {
        let (state, policy): (StageState, TimeoutPolicy) = {
            let controller = lock(&self.controller);
            (controller.state().clone(), controller.policy())
        };
        let now = Utc::now();
        let stage = state.current_stage();

        writeln!(out, "{}", "Clearance Status".bold().underline())?;
        writeln!(out, "  Current stage  : {}", stage.to_string().yellow())?;
        if let Some(elapsed) = state.run_duration(now) {
            writeln!(out, "  Detection time : {}s", elapsed.as_secs())?;
        }
        if stage == Stage::Complete
            && let Some(done) = state.completed_at()
            && let Some(left) = remaining(done, now, policy.completion_timeout())
        {
            writeln!(out, "  Clearance      : {}", format!("reset in {left}s").green())?;
        }

        let snapshot = self.status.as_ref().and_then(|s| s.fetch().ok());
        match &snapshot {
            Some(snap) => {
                writeln!(out, "  Last update    : {}", local_time(snap.observed_at))?;
                if snap.person_present {
                    writeln!(out, "  Person         : 🟢 person detected")?;
                } else {
                    writeln!(out, "  Person         : 🔴 no person")?;
                    if let Some(seen) = state.last_person_seen_at()
                        && let Some(left) = remaining(seen, now, policy.person_timeout())
                    {
                        let gone = (now - seen).to_std().unwrap_or(Duration::ZERO).as_secs();
                        writeln!(
                            out,
                            "  Absence        : {}",
                            format!("left {gone}s, reset in {left}s").yellow()
                        )?;
                    }
                }
            }
            None => writeln!(out, "  Last update    : {}", "unavailable".red())?,
        }

        writeln!(out)?;
        for def in &STAGE_DEFINITIONS {
            let marker = stage_marker(stage, def.stage);
            writeln!(
                out,
                "  {} Stage {} – {:<26} {}",
                marker,
                def.stage.number().unwrap_or_default(),
                def.name,
                render_items(def.items.as_slice(), snapshot.as_ref())
            )?;
        }

        writeln!(out)?;
        writeln!(out, "  {}", "Timers".dimmed())?;
        writeln!(
            out,
            "    last person seen : {}",
            state.last_person_seen_at().map_or_else(|| "-".to_string(), local_time)
        )?;
        writeln!(
            out,
            "    completed at     : {}",
            state.completed_at().map_or_else(|| "-".to_string(), local_time)
        )?;
        Ok(())
    }

    fn cmd_pass(&self, out: &mut dyn Write) -> io::Result<()> {
        let (advanced, stage) = {
            let mut controller = lock(&self.controller);
            let advanced = controller.manual_advance(Utc::now());
            (advanced, controller.stage())
        };
        if advanced {
            writeln!(out, "{} Now at {}", "✓".green().bold(), stage.to_string().bold())?;
        } else {
            writeln!(
                out,
                "  {} No stage can be passed while at {}.",
                "Warning:".yellow(),
                stage
            )?;
        }
        Ok(())
    }

    fn cmd_reset(&self, out: &mut dyn Write) -> io::Result<()> {
        lock(&self.controller).reset(MANUAL_RESET_REASON, Utc::now());
        writeln!(out, "{} Checklist reset.", "✓".green().bold())
    }

    fn cmd_logs(&self, out: &mut dyn Write) -> io::Result<()> {
        let lines = self.journal.recent().lines();
        writeln!(out, "{}", "Recent Events".bold().underline())?;
        if lines.is_empty() {
            writeln!(out, "  {}", "(no events yet)".dimmed())?;
        }
        for line in lines {
            writeln!(out, "  {line}")?;
        }
        Ok(())
    }

    fn cmd_history(&self, file: Option<&str>, out: &mut dyn Write) -> io::Result<()> {
        match file {
            None => match self.journal.history_files() {
                Ok(files) if files.is_empty() => {
                    writeln!(out, "  {}", "No journal files yet.".dimmed())?
                }
                Ok(files) => {
                    writeln!(out, "{}", "Journal Files".bold().underline())?;
                    for f in files {
                        writeln!(out, "  • {f}")?;
                    }
                    writeln!(out, "  Use {} to view one.", "/history <file>".bold())?;
                }
                Err(e) => writeln!(out, "{}: {}", "Error listing journal".red(), e)?,
            },
            Some(name) => match self.journal.tail(name, HISTORY_TAIL_LINES) {
                Ok(lines) => {
                    for line in lines {
                        writeln!(out, "  {line}")?;
                    }
                }
                Err(e) => writeln!(out, "{}: {}", "Read failed".red(), e)?,
            },
        }
        Ok(())
    }

    fn cmd_settings(&self, out: &mut dyn Write) -> io::Result<()> {
        let cfg = &self.config;
        writeln!(out, "{}", "Settings".bold().underline())?;
        writeln!(out, "  Config file        : {}", config::config_path().display())?;
        writeln!(out, "  Status database    : {}", cfg.db_path.yellow())?;
        writeln!(out, "  Refresh interval   : {}s", cfg.refresh_interval_secs)?;
        writeln!(out, "  Person timeout     : {}s", cfg.person_timeout_secs)?;
        writeln!(out, "  Completion timeout : {}s", cfg.completion_timeout_secs)?;
        writeln!(out, "  Journal directory  : {}", cfg.log_dir.yellow())?;
        writeln!(out, "  {}", "Changes take effect on restart.".dimmed())
    }
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(shutdown: Arc<AtomicBool>, console: Console) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "clearance>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        let Some(command) = parse(&line) else {
            continue;
        };
        match console.execute(command, &mut stdout) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => {
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            Err(e) => {
                eprintln!("{}: {}", "Write error".red(), e);
                break;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help(out: &mut dyn Write) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "Clearance Commands".bold().underline())?;
    writeln!(out, "  {}           – stage, timers and readings", "/status".bold().cyan())?;
    writeln!(out, "  {}             – manually pass the current stage", "/pass".bold().cyan())?;
    writeln!(out, "  {}            – reset the checklist", "/reset".bold().cyan())?;
    writeln!(out, "  {}             – recent events", "/logs".bold().cyan())?;
    writeln!(out, "  {} – journal files / file tail", "/history [file]".bold().cyan())?;
    writeln!(out, "  {}         – show configuration", "/settings".bold().cyan())?;
    writeln!(out, "  {}     – exit the CLI", "/quit  /exit".bold().cyan())?;
    writeln!(out)
}

fn local_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Whole seconds left before `limit` elapses since `since`, rounded up.
/// `None` once the limit has passed.
fn remaining(since: DateTime<Utc>, now: DateTime<Utc>, limit: Duration) -> Option<u64> {
    let elapsed = (now - since).to_std().unwrap_or(Duration::ZERO);
    limit
        .checked_sub(elapsed)
        .filter(|left| !left.is_zero())
        .map(|left| left.as_secs_f64().ceil() as u64)
}

fn stage_marker(current: Stage, stage: Stage) -> String {
    if current > stage {
        "●".green().to_string()
    } else if current == stage {
        "●".yellow().to_string()
    } else {
        "○".dimmed().to_string()
    }
}

fn render_items(
    items: &[clearance_types::EquipmentItem],
    snapshot: Option<&StatusSnapshot>,
) -> String {
    items
        .iter()
        .map(|&item| {
            let mark = match snapshot.map(|s| s.reading(item).is_pass()) {
                Some(true) => "✅",
                Some(false) => "❌",
                None => "❓",
            };
            format!("{} {mark}", item.label())
        })
        .collect::<Vec<_>>()
        .join("  ")
}
