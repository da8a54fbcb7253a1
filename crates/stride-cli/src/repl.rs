//! REPL – Read-Eval-Print Loop for the Stride operator shell.
//!
//! Supported commands (the leading `/` is optional):
//!   help              – show this list
//!   list              – show the behavior catalog
//!   state             – print the latest robot state report
//!   run <id|name>     – execute a behavior (a bare id works too)
//!   trigger <label>   – fire an operator trigger such as `Thumb_Up`
//!   triggers          – show the trigger map
//!   quit | exit       – stop the robot feed and exit
//!
//! Ctrl-C while a behavior runs cancels that behavior; the sequencer stops
//! the robot and reports `Cancelled`.

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use stride_kernel::{StabilityThresholds, StateReport};
use stride_perception::{Liveness, TelemetryIngest};
use stride_runtime::{BehaviorExecutionResult, BehaviorSequencer, Dispatch, Outcome, TriggerDispatcher};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

// ─────────────────────────────────────────────────────────────────────────────
// Active run slot
// ─────────────────────────────────────────────────────────────────────────────

/// Cancellation token of the behavior currently executing, shared with the
/// Ctrl-C handler.
#[derive(Clone, Default)]
pub struct ActiveRun(Arc<Mutex<Option<CancellationToken>>>);

impl ActiveRun {
    fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
        token
    }

    fn finish(&self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    /// Cancel the running behavior.  Returns `false` when nothing is running.
    pub fn cancel(&self) -> bool {
        match self.0.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command parsing
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Id(u32),
    Name(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    List,
    State,
    Run(Target),
    Trigger(String),
    Triggers,
    Quit,
    Unknown(String),
}

pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    let line = line.strip_prefix('/').unwrap_or(line);
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };
    match head.to_lowercase().as_str() {
        "help" | "?" => Command::Help,
        "list" | "ls" => Command::List,
        "state" | "status" => Command::State,
        "quit" | "exit" => Command::Quit,
        "triggers" => Command::Triggers,
        "trigger" | "gesture" if !rest.is_empty() => Command::Trigger(rest.to_string()),
        "run" if !rest.is_empty() => Command::Run(parse_target(rest)),
        _ => match head.parse::<u32>() {
            Ok(id) if rest.is_empty() => Command::Run(Target::Id(id)),
            _ => Command::Unknown(line.to_string()),
        },
    }
}

fn parse_target(raw: &str) -> Target {
    match raw.parse::<u32>() {
        Ok(id) => Target::Id(id),
        Err(_) => Target::Name(raw.to_string()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shell
// ─────────────────────────────────────────────────────────────────────────────

/// Everything the shell needs to serve commands.
pub struct Shell<'a> {
    pub runtime: Handle,
    pub sequencer: Arc<BehaviorSequencer>,
    pub dispatcher: Arc<TriggerDispatcher>,
    pub ingest: &'a TelemetryIngest,
    pub thresholds: StabilityThresholds,
    pub active: ActiveRun,
    pub shutdown: Arc<AtomicBool>,
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(shell: &Shell<'_>) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shell.shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "stride>".bold().cyan());
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

        if shell.shutdown.load(Ordering::SeqCst) {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        match parse_command(&line) {
            Command::Help => cmd_help(),
            Command::List => cmd_list(shell),
            Command::State => cmd_state(shell),
            Command::Run(target) => cmd_run(shell, target),
            Command::Trigger(label) => cmd_trigger(shell, &label),
            Command::Triggers => cmd_triggers(shell),
            Command::Quit => {
                println!("{}", "Goodbye.".green());
                shell.shutdown.store(true, Ordering::SeqCst);
                break;
            }
            Command::Unknown(other) => {
                println!(
                    "{} '{}'. Type {} for available commands.",
                    "Unknown command:".red(),
                    other.yellow(),
                    "help".bold()
                );
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "Stride Commands".bold().underline());
    println!("  {}          – show the behavior catalog", "list".bold().cyan());
    println!("  {}         – print the latest robot state", "state".bold().cyan());
    println!("  {} – execute a behavior", "run <id|name>".bold().cyan());
    println!("  {} – fire a trigger in the background", "trigger <label>".bold().cyan());
    println!("  {}      – show the trigger map", "triggers".bold().cyan());
    println!("  {}   – exit the shell", "quit  exit".bold().cyan());
    println!("  Press {} during a run to stop the robot.", "Ctrl-C".bold());
    println!();
}

fn cmd_list(shell: &Shell<'_>) {
    println!("{}", "Behavior Catalog".bold().underline());
    for entry in shell.sequencer.catalog().list() {
        let id = format!("{:>3}", entry.id);
        let flags = if entry.requires_state_monitoring { " [monitored]" } else { "" };
        if entry.enabled {
            println!("  {}  {}{}", id.bold(), entry.name, flags.cyan());
        } else {
            println!("  {}  {}{}", id.dimmed(), entry.name.dimmed(), " (disabled)".dimmed());
        }
    }
}

fn cmd_state(shell: &Shell<'_>) {
    let counters = shell.ingest.counters();
    let liveness = match shell.ingest.liveness(Instant::now()) {
        Liveness::Live => "live".green(),
        Liveness::Stale => "stale".yellow(),
        Liveness::NoData => "no data".red(),
    };
    println!("{}", "Robot State".bold().underline());
    println!(
        "  Session: {}  Feed: {}  Frames: {} decoded / {} errors",
        shell.ingest.state().to_string().bold(),
        liveness,
        counters.frames_decoded,
        counters.decode_errors
    );

    match shell.ingest.reader().current() {
        Some(snapshot) => {
            let report = StateReport::from_snapshot(&snapshot, &shell.thresholds);
            for line in report.to_string().lines() {
                println!("  {line}");
            }
        }
        None => println!("  {}", "No state received yet.".yellow()),
    }
}

fn cmd_run(shell: &Shell<'_>, target: Target) {
    let id = match target {
        Target::Id(id) => id,
        Target::Name(name) => match shell.sequencer.catalog().find_by_name(&name) {
            Some(def) => def.id,
            None => {
                println!("{} '{}'", "Unknown behavior:".red(), name.yellow());
                return;
            }
        },
    };

    let name = shell
        .sequencer
        .catalog()
        .lookup(id)
        .map(|def| def.name.clone())
        .unwrap_or_else(|| format!("#{id}"));
    println!("  {} {} …", "Running".bold(), name.cyan());

    let token = shell.active.begin();
    let result = shell.runtime.block_on(shell.sequencer.run(id, &token));
    shell.active.finish();

    match result {
        Ok(result) => print_result(&result),
        Err(e) => println!("  {}: {}", "Error".red(), e),
    }
}

fn cmd_triggers(shell: &Shell<'_>) {
    println!("{}", "Triggers".bold().underline());
    for (label, id) in shell.dispatcher.triggers() {
        let name = shell
            .sequencer
            .catalog()
            .lookup(*id)
            .map(|def| def.name.clone())
            .unwrap_or_else(|| format!("#{id}"));
        println!("  {:<12} → {}", label.bold(), name);
    }
}

fn cmd_trigger(shell: &Shell<'_>, label: &str) {
    match shell.dispatcher.dispatch(label) {
        Dispatch::Started { behavior_id, handle } => {
            println!("  {} {} (behavior {})", "Triggered".bold(), label.cyan(), behavior_id);
            // Report when the background run ends without blocking the prompt.
            shell.runtime.spawn(async move {
                match handle.await {
                    Ok(Ok(result)) => print_result(&result),
                    Ok(Err(e)) => println!("  {}: {}", "Error".red(), e),
                    Err(e) => println!("  {}: {}", "Trigger task failed".red(), e),
                }
            });
        }
        Dispatch::CoolingDown { remaining } => {
            println!("  {} {} ({:.1}s left)", "Cooling down:".yellow(), label, remaining.as_secs_f64());
        }
        Dispatch::Busy => println!("  {} a behavior is already running", "Dropped:".yellow()),
        Dispatch::Unknown => println!("{} '{}'", "Unknown trigger:".red(), label.yellow()),
    }
}

fn print_result(result: &BehaviorExecutionResult) {
    for report in &result.reports {
        for line in report.lines() {
            println!("    {}", line.dimmed());
        }
    }
    match &result.outcome {
        Outcome::Completed => println!(
            "  {} completed in {:.1}s",
            "✓".green().bold(),
            result.elapsed.as_secs_f64()
        ),
        Outcome::Aborted(reason) => println!(
            "  {} aborted after {:.1}s: {}",
            "✗".red().bold(),
            result.elapsed.as_secs_f64(),
            reason
        ),
        Outcome::Rejected(reason) => println!("  {} rejected: {}", "✗".yellow().bold(), reason),
    }
    if let Some(distance) = result.measured_displacement {
        println!("  Measured displacement: {:.2} m", distance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_with_and_without_slash() {
        assert_eq!(parse_command("help"), Command::Help);
        assert_eq!(parse_command("/list"), Command::List);
        assert_eq!(parse_command("  STATE "), Command::State);
        assert_eq!(parse_command("/exit"), Command::Quit);
    }

    #[test]
    fn run_accepts_ids_and_names() {
        assert_eq!(parse_command("run 22"), Command::Run(Target::Id(22)));
        assert_eq!(parse_command("21"), Command::Run(Target::Id(21)));
        assert_eq!(
            parse_command("run custom greeting"),
            Command::Run(Target::Name("custom greeting".to_string()))
        );
    }

    #[test]
    fn incomplete_or_unknown_input_is_reported() {
        assert_eq!(parse_command("run"), Command::Unknown("run".to_string()));
        assert_eq!(parse_command("21 22"), Command::Unknown("21 22".to_string()));
        assert_eq!(parse_command("/dance"), Command::Unknown("dance".to_string()));
    }

    #[test]
    fn trigger_commands_keep_the_label() {
        assert_eq!(parse_command("trigger Thumb_Up"), Command::Trigger("Thumb_Up".to_string()));
        assert_eq!(parse_command("/gesture Open_Palm"), Command::Trigger("Open_Palm".to_string()));
        assert_eq!(parse_command("triggers"), Command::Triggers);
        assert_eq!(parse_command("trigger"), Command::Unknown("trigger".to_string()));
    }

    #[test]
    fn active_run_cancels_only_while_running() {
        let active = ActiveRun::default();
        assert!(!active.cancel());

        let token = active.begin();
        assert!(active.cancel());
        assert!(token.is_cancelled());

        active.finish();
        assert!(!active.cancel());
    }
}
