//! DUSD Protocol CLI
//!
//! Replays scripted scenarios against the deficit-accounting engine.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use console::{style, Term};

use dusd_core::cli::{CliConfig, OutputFormat, OutputFormatter, Scenario, ScenarioRunner};

/// DUSD Protocol CLI - deficit accounting for a multi-collateral stablecoin
#[derive(Parser)]
#[command(name = "dusd")]
#[command(author = "DUSD Team")]
#[command(version = dusd_core::VERSION)]
#[command(about = "Command-line interface for the DUSD protocol", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to a JSON config file
    #[arg(short, long, env = "DUSD_CONFIG")]
    config: Option<PathBuf>,

    /// Output format (text, json, json-pretty)
    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scenario file
    Run {
        /// Scenario JSON file
        path: PathBuf,
    },

    /// Show the effective protocol parameters
    Params,

    /// Print the built-in example scenario
    Example,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run_command(&cli) {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}

fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let config = CliConfig::resolve(cli.config.as_ref())?;
    let output = OutputFormatter::new(cli.format.unwrap_or(config.format)).with_color(config.color);

    match &cli.command {
        Commands::Run { path } => cmd_run(&config, &output, path),
        Commands::Params => {
            output.data(&config.params);
            Ok(())
        }
        Commands::Example => {
            println!("{}", Scenario::example().to_json()?);
            Ok(())
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMAND HANDLERS
// ═══════════════════════════════════════════════════════════════════════════════

fn cmd_run(config: &CliConfig, output: &OutputFormatter, path: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let scenario = Scenario::from_json(&text)?;

    if !output.is_json() {
        let _ = Term::stdout().write_line(&format!(
            "{} Running scenario {}...",
            style("→").cyan(),
            style(&scenario.name).bold()
        ));
    }

    let runner = ScenarioRunner::new(&scenario, &config.params)?;
    let report = runner.run(&scenario)?;

    if output.is_json() {
        output.data(&report);
        return Ok(());
    }

    output.header("Steps");
    for step in &report.steps {
        let mark = if step.ok { style("✓").green() } else { style("✗").red() };
        println!("  {} {:>3} {:<16} {}", mark, step.index, step.action, step.detail);
    }

    let expected_failures = report.steps.iter().filter(|s| !s.ok).count();
    if expected_failures > 0 {
        output.warning(&format!("{} step(s) failed as expected", expected_failures));
    }

    output.header("Accounts");
    for account in &report.accounts {
        output.kv(
            &account.account,
            &format!(
                "{} DUSD, staked {}, withdrawable {} ({})",
                account.dusd, account.staked, account.withdraw_able, account.status
            ),
        );
    }

    output.header("System");
    output.kv("snapshot", &report.final_snapshot);
    output.kv("redemption rate", &report.redemption_rate);
    output.kv("event digest", &report.event_digest);
    output.success(&format!("scenario {} completed", report.name));
    Ok(())
}
