//! PALISADE gateway — enforcement demo CLI
//!
//! Runs one or all of the five gateway scenarios. Each scenario wires real
//! PALISADE components (validator, allowlist, quota engine, safe-read
//! executor, audit logger) around the in-memory adapter and drives tool
//! invocations through the execution boundary.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- happy-path
//!   cargo run -p demo -- injection
//!   cargo run -p demo -- unauthorized-table
//!   cargo run -p demo -- quota-burst
//!   cargo run -p demo -- read-only

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod scenarios;

use scenarios::{happy_path, injection, quota_burst, read_only, unauthorized_table};

// ── CLI definition ────────────────────────────────────────────────────────────

/// PALISADE — capability-gated read-only SQL gateway demo.
///
/// Each subcommand exercises one enforcement layer of the execution
/// boundary against the in-memory backend.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "PALISADE gateway enforcement demo",
    long_about = "Drives tool invocations through the PALISADE execution boundary,\n\
                  showing each enforcement layer rejecting what it exists to reject.\n\n\
                  Scenarios:\n\
                  1. Happy Path          — full grant set, catalog + parameterized query\n\
                  2. Injection           — stacked statements, comments, UNION, OFFSET\n\
                  3. Unauthorized Table  — allowlist fencing, incl. join smuggling\n\
                  4. Quota Burst         — tenant-wide rate cap vs rotating cap sets\n\
                  5. Read-Only           — mutating tool blocked despite a valid grant"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all five scenarios in sequence.
    RunAll,
    /// Scenario 1: full grant set, catalog and query calls succeed.
    HappyPath,
    /// Scenario 2: injection shapes die in the SQL validator.
    Injection,
    /// Scenario 3: allowlist fences off a readable-looking table.
    UnauthorizedTable,
    /// Scenario 4: rotating capability sets cannot stretch a tenant quota.
    QuotaBurst,
    /// Scenario 5: read-only mode rejects a granted mutation tool.
    ReadOnly,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Structured logging; audit events also land on stderr as JSON lines.
    // Set RUST_LOG=debug for the full pipeline trace.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    print_banner();

    let result = match cli.command {
        Command::RunAll => run_all(),
        Command::HappyPath => happy_path::run_scenario(),
        Command::Injection => injection::run_scenario(),
        Command::UnauthorizedTable => unauthorized_table::run_scenario(),
        Command::QuotaBurst => quota_burst::run_scenario(),
        Command::ReadOnly => read_only::run_scenario(),
    };

    match result {
        Ok(()) => {
            println!("All selected scenarios completed as expected.");
        }
        Err(e) => {
            eprintln!("Demo error: {e}");
            std::process::exit(1);
        }
    }
}

fn run_all() -> palisade_contracts::error::GatewayResult<()> {
    happy_path::run_scenario()?;
    injection::run_scenario()?;
    unauthorized_table::run_scenario()?;
    quota_burst::run_scenario()?;
    read_only::run_scenario()?;
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("PALISADE — Read-only SQL Gateway");
    println!("================================");
    println!();
    println!("Execution boundary per invocation:");
    println!("  [1] Session context bound and authentic");
    println!("  [2] Tool registry lookup");
    println!("  [3] Read-only gate (mutating tools rejected)");
    println!("  [4] Capability authorization (tool.invoke, name)");
    println!("  [5] Quota reservation (rate / cost / concurrency)");
    println!("  [6] Input schema validation");
    println!("  [7] Handler → SQL validator → allowlist → safe read → audit");
    println!();
}
