//! `stride` – operator shell for the adaptive behavior layer.
//!
//! This binary:
//!
//! 1. Checks for `~/.stride/config.toml`; runs a **First-Run Wizard** when the
//!    file is absent.
//! 2. Boots the stack: telemetry bus, simulated quadruped, telemetry ingest,
//!    the standard behavior catalog, the sequencer and the trigger dispatcher.
//! 3. Drops the operator into an **interactive REPL** (`list`, `run`,
//!    `trigger`, `state`, `help`, `quit`).
//! 4. Intercepts **Ctrl-C**: a running behavior is cancelled and the robot
//!    stopped; at the prompt the shell exits.

mod config;
mod repl;

use colored::Colorize;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, warn};

use stride_hal::SimQuadruped;
use stride_middleware::{LocalTelemetryBus, TelemetryBus};
use stride_perception::TelemetryIngest;
use stride_runtime::{BehaviorSequencer, TriggerDispatcher, init_tracing, standard_catalog, standard_triggers};
use stride_types::StrideError;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Publish period of the simulated robot's state feed.
const SIM_FEED_PERIOD: Duration = Duration::from_millis(20);

fn main() {
    let _tracing = init_tracing("stride");

    print_banner();

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(None) => run_first_run_wizard(),
        Ok(Some(cfg)) => {
            println!("  Config loaded from {}", config::config_path().display().to_string().bold());
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to build the Tokio runtime");
            std::process::exit(1);
        }
    };

    // ── Boot ──────────────────────────────────────────────────────────────
    let stack = match runtime.block_on(boot(&cfg)) {
        Ok(stack) => stack,
        Err(e) => {
            println!("{} {}", "Boot failed:".red().bold(), e);
            return;
        }
    };

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let active = repl::ActiveRun::default();
    {
        let shutdown = shutdown.clone();
        let active = active.clone();
        let dispatcher = stack.dispatcher.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            println!();
            let triggered = dispatcher.cancel_running();
            if active.cancel() || triggered {
                println!("{}", "⚠  Ctrl-C received – stopping the running behavior …".yellow().bold());
            } else {
                println!("{}", "⚠  Ctrl-C received – press Enter to exit Stride.".yellow().bold());
                shutdown.store(true, Ordering::SeqCst);
            }
        }) {
            warn!(error = %e, "Failed to install Ctrl-C handler; behaviors can only be stopped by completion");
        }
    }

    println!();
    println!("  Type {} for a list of commands.\n", "help".bold().cyan());

    let shell = repl::Shell {
        runtime: runtime.handle().clone(),
        sequencer: stack.sequencer.clone(),
        dispatcher: stack.dispatcher.clone(),
        ingest: &stack.ingest,
        thresholds: cfg.stability,
        active,
        shutdown,
    };
    repl::run(&shell);
    drop(shell);

    runtime.block_on(stack.shutdown());
    println!("{}", "  ✓ Exiting Stride.".green());
}

// ─────────────────────────────────────────────────────────────────────────────
// Boot sequence
// ─────────────────────────────────────────────────────────────────────────────

struct Stack {
    ingest: TelemetryIngest,
    sequencer: Arc<BehaviorSequencer>,
    dispatcher: Arc<TriggerDispatcher>,
    feed_cancel: CancellationToken,
    feed: JoinHandle<()>,
}

impl Stack {
    async fn shutdown(mut self) {
        self.dispatcher.cancel_running();
        self.feed_cancel.cancel();
        if let Err(e) = self.feed.await {
            warn!(error = %e, "sim telemetry task ended abnormally");
        }
        self.ingest.stop().await;
    }
}

async fn boot(cfg: &config::Config) -> Result<Stack, StrideError> {
    println!();
    println!("{}", "═══════════════════════════════════════".bold());
    println!("{}", "          Stride Boot Sequence         ".bold().cyan());
    println!("{}", "═══════════════════════════════════════".bold());

    step(1, "Initializing Telemetry Bus");
    let bus = LocalTelemetryBus::default();
    println!("{}", "OK".green());

    step(2, "Starting simulated quadruped");
    let sim = Arc::new(SimQuadruped::new());
    let feed_cancel = CancellationToken::new();
    let feed = sim.spawn_telemetry(bus.clone(), &cfg.telemetry.topic, SIM_FEED_PERIOD, feed_cancel.clone());
    println!("{}", "OK".green());

    step(3, "Subscribing to robot state");
    let dyn_bus: Arc<dyn TelemetryBus> = Arc::new(bus);
    let mut ingest = TelemetryIngest::new(dyn_bus, cfg.ingest_config());
    if let Err(e) = ingest.start().await {
        println!("{}", "FAILED".red());
        feed_cancel.cancel();
        return Err(e);
    }
    println!("{} ({})", "OK".green(), cfg.telemetry.topic.dimmed());

    step(4, "Loading behavior catalog");
    let catalog = match standard_catalog(cfg.stability) {
        Ok(catalog) => Arc::new(catalog),
        Err(e) => {
            println!("{}", "FAILED".red());
            feed_cancel.cancel();
            ingest.stop().await;
            return Err(e);
        }
    };
    let enabled = catalog.list().iter().filter(|entry| entry.enabled).count();
    println!("{} ({} behaviors, {} enabled)", "OK".green(), catalog.len(), enabled);

    step(5, "Arming behavior sequencer");
    let sequencer = Arc::new(BehaviorSequencer::new(
        catalog,
        sim,
        ingest.reader(),
        ingest.session(),
        cfg.sequencer_config(),
    ));
    let dispatcher = Arc::new(TriggerDispatcher::new(
        sequencer.clone(),
        standard_triggers(),
        cfg.trigger_cooldown(),
        Handle::current(),
    ));
    println!("{} ({} triggers)", "OK".green(), dispatcher.triggers().len());

    println!("{}", "═══════════════════════════════════════".bold());
    println!(
        "  {} Stride is {}. Monitoring session: {}",
        "✓".green().bold(),
        "RUNNING".green().bold(),
        ingest.state().to_string().bold()
    );
    println!("{}", "═══════════════════════════════════════".bold());

    Ok(Stack {
        ingest,
        sequencer,
        dispatcher,
        feed_cancel,
        feed,
    })
}

fn step(n: usize, label: &str) {
    print!("  [{}/5] {} … ", n, label.bold());
    std::io::stdout().flush().ok();
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() -> config::Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║       Stride First-Run Wizard        ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's set up Stride.\n");

    let mut cfg = config::Config::default();

    cfg.telemetry.topic = prompt_line(
        &format!("  Robot state topic [{}]: ", cfg.telemetry.topic),
        &cfg.telemetry.topic,
    );

    let poll = prompt_line(
        &format!("  Stability poll interval in ms [{}]: ", cfg.sequencer.poll_interval_ms),
        &cfg.sequencer.poll_interval_ms.to_string(),
    );
    if let Ok(ms) = poll.trim().parse::<u64>() {
        cfg.sequencer.poll_interval_ms = ms;
    }

    let height = prompt_line(
        &format!("  Low body height threshold in m [{}]: ", cfg.stability.low_height_m),
        &cfg.stability.low_height_m.to_string(),
    );
    if let Ok(m) = height.trim().parse::<f64>() {
        cfg.stability.low_height_m = m;
    }

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   _____ __       _     __    "#.bold().cyan());
    println!("{}", r#"  / ___// /______(_)___/ /__  "#.bold().cyan());
    println!("{}", r#"  \__ \/ __/ ___/ / __  / _ \ "#.bold().cyan());
    println!("{}", r#" ___/ / /_/ /  / / /_/ /  __/ "#.bold().cyan());
    println!("{}", r#"/____/\__/_/  /_/\__,_/\___/  "#.bold().cyan());
    println!();
    println!("  {} {}", "Stride".bold(), format!("v{}", env!("CARGO_PKG_VERSION")).dimmed());
    println!("  Adaptive behavior control for legged robots");
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn prompt_line(msg: &str, default: &str) -> String {
    use std::io::BufRead;
    print!("{}", msg);
    std::io::stdout().flush().ok();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let t = line.trim().to_string();
            if t.is_empty() { default.to_string() } else { t }
        }
        Err(_) => default.to_string(),
    }
}
