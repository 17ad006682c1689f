//! `aerosim` – headless GPS sensor simulation.
//!
//! `aerosim run --scene <file>` builds the world a scene file describes,
//! loads a noisy GPS plugin onto every sensor, starts a topic bridge per
//! robot namespace and steps the world, printing each record the bridges
//! mirror.  `aerosim validate --scene <file>` only checks that the scene
//! loads and every plugin configures.
//!
//! Ctrl-C stops stepping; plugins are still unloaded and the summary printed.

mod cli;
mod config;
mod session;
mod telemetry;

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use colored::Colorize;
use tracing::warn;

use aerosim_middleware::BridgedFrame;
use aerosim_types::SimError;

use crate::cli::{Cli, Commands, RunArgs, ValidateArgs};
use crate::session::RunSummary;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = telemetry::init_tracing("aerosim");

    let result = match cli.command {
        Commands::Run(args) => run(args),
        Commands::Validate(args) => validate(args),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// run
// ─────────────────────────────────────────────────────────────────────────────

fn run(args: RunArgs) -> Result<ExitCode, SimError> {
    let scene = config::load_from(&args.scene)?;
    let steps = args.steps.unwrap_or(scene.world.steps);

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping the world …".yellow().bold());
        stop_flag.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler; the run can only end on its own");
    }

    println!(
        "  {} {} ({} steps of {} s)",
        "Running".bold().cyan(),
        args.scene.display().to_string().bold(),
        steps,
        scene.world.step_size
    );

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| SimError::Runtime(format!("failed to start runtime: {e}")))?;
    let quiet = args.quiet;
    let summary = runtime.block_on(session::run_scene(&scene, steps, stop, move |frame| {
        if !quiet {
            print_frame(frame);
        }
    }))?;

    print_summary(&summary);
    Ok(if summary.plugin_failures.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_frame(frame: &BridgedFrame) {
    println!(
        "  {} {} {}",
        frame.bridged_at.format("%H:%M:%S%.3f").to_string().dimmed(),
        frame.ros_topic.bold(),
        frame.json
    );
}

fn print_summary(summary: &RunSummary) {
    println!();
    if summary.interrupted {
        println!("  {}", "Interrupted.".yellow());
    }
    println!(
        "  {} {} steps, sim time {} s",
        "✓".green().bold(),
        summary.steps,
        summary.sim_time
    );
    println!(
        "    {} sensor updates, {} bridged topics, {} frames",
        summary.sensor_events, summary.bridged_topics, summary.frames
    );
    println!("    {} plugin(s) loaded", summary.plugins_loaded);
    print_failures(&summary.plugin_failures);
}

// ─────────────────────────────────────────────────────────────────────────────
// validate
// ─────────────────────────────────────────────────────────────────────────────

fn validate(args: ValidateArgs) -> Result<ExitCode, SimError> {
    let scene = config::load_from(&args.scene)?;
    let failures = session::validate_scene(&scene)?;

    if failures.is_empty() {
        println!(
            "  {} {} ({} link(s), {} sensor(s))",
            "✓".green().bold(),
            args.scene.display().to_string().bold(),
            scene.links.len(),
            scene.sensors.len()
        );
        Ok(ExitCode::SUCCESS)
    } else {
        print_failures(&failures);
        Ok(ExitCode::FAILURE)
    }
}

fn print_failures(failures: &[(String, SimError)]) {
    for (sensor, e) in failures {
        println!("    {} {}: {}", "✗".red().bold(), sensor.bold(), e);
    }
}
