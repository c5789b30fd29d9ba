//! parkline CLI - simulated print pause/resume runs
//!
//! Replays a G-code job on a simulated printer, optionally pausing and
//! resuming it part way through, and reports what the machine did.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use parkline::{Position, BUFSIZE, RESUME_COMMAND};
use parkline_sim::{MachineProfile, RunReport, Scenario, SimConfig, SimPrinter};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "parkline")]
#[command(about = "Simulate print pause/resume on a G-code job", long_about = None)]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a G-code job on the simulated printer
    Run {
        /// G-code job file
        file: PathBuf,
        /// TOML settings file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Machine profile key (overrides the config file)
        #[arg(short, long)]
        profile: Option<String>,
        /// Pause once this many commands have run
        #[arg(long)]
        pause_after: Option<u64>,
        /// Resume after this many idle steps spent paused
        #[arg(long, default_value_t = 10)]
        resume_after: u64,
        /// Stay parked instead of resuming
        #[arg(long)]
        no_resume: bool,
        /// Give up after this many steps
        #[arg(long, default_value_t = 1_000_000)]
        max_steps: u64,
        /// Also run without pausing and compare the two runs
        #[arg(long)]
        compare: bool,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List built-in machine profiles
    Profiles,
    /// Validate a TOML settings file
    CheckConfig {
        /// Settings file
        path: PathBuf,
    },
}

/// Outcome of comparing a paused run with an uninterrupted one.
#[derive(Serialize)]
struct Comparison {
    matches: bool,
    commands_match: bool,
    baseline_position: Position,
    baseline_steps: u64,
}

#[derive(Serialize)]
struct Output<'a> {
    job: &'a str,
    profile: &'a str,
    report: &'a RunReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    comparison: Option<Comparison>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            file,
            config,
            profile,
            pause_after,
            resume_after,
            no_resume,
            max_steps,
            compare,
            json,
        } => {
            let scenario = Scenario {
                pause_after,
                resume_after: (!no_resume).then_some(resume_after),
                max_steps,
            };
            let config = load_config(config.as_deref(), profile)?;
            run_job(&file, &config, scenario, compare, json)?;
        }
        Commands::Profiles => {
            list_profiles();
        }
        Commands::CheckConfig { path } => {
            check_config(&path)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>, profile: Option<String>) -> Result<SimConfig> {
    let mut config = match path {
        Some(path) => SimConfig::load(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => SimConfig::default(),
    };
    if let Some(profile) = profile {
        config.profile = profile;
    }
    config.validate()?;
    debug!(profile = %config.profile, "settings loaded");
    Ok(config)
}

fn start(config: &SimConfig, name: &str, text: &str) -> Result<SimPrinter<BUFSIZE>> {
    let mut printer = SimPrinter::new(config)?;
    printer.load_job(name, text);
    printer.submit(RESUME_COMMAND);
    Ok(printer)
}

fn run_job(
    file: &Path,
    config: &SimConfig,
    scenario: Scenario,
    compare: bool,
    json: bool,
) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("reading job {}", file.display()))?;
    let name = file
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("job.gcode");

    info!(job = name, profile = %config.profile, "starting run");
    let mut printer = start(config, name, &text)?;
    let report = printer.run_scenario(scenario);

    let comparison = if compare {
        let mut baseline = start(config, name, &text)?;
        let straight = baseline.run_scenario(Scenario::straight(scenario.max_steps));
        let commands_match = baseline.job_commands() == printer.job_commands();
        Some(Comparison {
            matches: commands_match
                && straight.position == report.position
                && straight.modes == report.modes,
            commands_match,
            baseline_position: straight.position,
            baseline_steps: straight.steps,
        })
    } else {
        None
    };
    let diverged = comparison.as_ref().is_some_and(|c| !c.matches);

    if json {
        let output = Output {
            job: name,
            profile: &config.profile,
            report: &report,
            comparison,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_report(name, &config.profile, &report);
        if let Some(comparison) = &comparison {
            println!("\nComparison with uninterrupted run:");
            println!("  Job commands match: {}", comparison.commands_match);
            println!("  Baseline position: {}", comparison.baseline_position);
            println!("  Baseline steps: {}", comparison.baseline_steps);
            println!(
                "  Result: {}",
                if comparison.matches { "identical" } else { "DIFFERENT" }
            );
        }
    }

    if let Some(reason) = &report.halted {
        bail!("machine halted: {}", reason);
    }
    if diverged {
        bail!("paused run diverged from the uninterrupted run");
    }
    Ok(())
}

fn print_report(name: &str, profile: &str, report: &RunReport) {
    println!("parkline run: {} ({})", name, profile);
    println!("  Steps: {}", report.steps);
    println!("  Job: {:?}, {} lines read", report.job_state, report.lines_read);
    println!("  Job timer: {} steps", report.job_time);
    println!("  Phase: {:?}", report.phase);
    println!("  Position: {}", report.position);
    println!(
        "  Modes: xyz {}, e {}",
        if report.modes.relative_xyz { "relative" } else { "absolute" },
        if report.modes.relative_e { "relative" } else { "absolute" }
    );
    println!(
        "  Pauses: {} ({} commands held), resumes: {} ({} replayed)",
        report.pauses, report.backed_up, report.resumes, report.replayed
    );
    println!(
        "  Moves: {} ({:.1}s of motion)",
        report.moves, report.motion_time_s
    );
    println!("  Flow: {}%", report.flow_percentage);
    println!("  Status: {}", report.status);

    if !report.rejected.is_empty() {
        println!("\nRejected:");
        for (i, reason) in report.rejected.iter().enumerate() {
            println!("  {}: {}", i + 1, reason);
        }
    }
    if let Some(reason) = &report.halted {
        println!("\nHalted: {}", reason);
    }
}

fn list_profiles() {
    println!("Machine profiles:");
    for profile in MachineProfile::all_profiles() {
        println!(
            "  {:<10} {} ({}x{}x{} mm, retract {} mm)",
            profile.key,
            profile.name,
            profile.bed_x,
            profile.bed_y,
            profile.bed_z,
            profile.retraction_distance
        );
    }
}

fn check_config(path: &Path) -> Result<()> {
    let config = SimConfig::load(path)
        .with_context(|| format!("checking {}", path.display()))?;
    let profile = config.machine_profile()?;
    println!("{}: ok", path.display());
    println!("  Profile: {} ({})", profile.name, profile.key);
    println!("  Resume feedrate: {} mm/min", config.resume_feedrate);
    println!(
        "  Park: X{} Y{} F{}",
        config.park.x, config.park.y, config.park.feedrate
    );
    println!("  Retract: {} mm", config.retract_length_for(&profile));
    println!("  Recovery: {}", if config.recovery { "on" } else { "off" });
    println!("  Macro presets: {}", config.macros.len());
    Ok(())
}
