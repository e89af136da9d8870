//! CLI entry point for `rlsctl`.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use rlsctl::classifier::{classify, classify_policies, render};
use rlsctl::harness::{self, Scenario};
use rlsctl::output::formatter;
use rlsctl::policy::{policies_from_rows, PgPolicyRow};
use rlsctl::simulator::to_evaluable;

#[derive(Parser)]
#[command(
    name = "rlsctl",
    version,
    about = "Classify, render, deploy and locally simulate PostgreSQL Row-Level Security policies"
)]
struct Cli {
    /// Print debug diagnostics to stderr
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify exported `pg_policies` rows and write config, deploy SQL and a report
    Extract {
        /// JSON array of `pg_policies` rows
        input: PathBuf,

        /// Output directory
        #[arg(long, default_value = "rlsctl-output")]
        output_dir: PathBuf,

        /// Base name of the written files (defaults to the input file stem)
        #[arg(long)]
        name: Option<String>,

        /// Exit with status 1 when any predicate is classified below this confidence
        #[arg(long, default_value_t = 0.5)]
        min_confidence: f64,
    },
    /// Classify a single SQL predicate
    Classify {
        /// SQL boolean expression
        expression: String,
    },
    /// Show the evaluable form of a SQL predicate
    Translate {
        /// SQL boolean expression
        expression: String,
    },
    /// Run a scenario file against the local policy engine
    Test {
        /// Scenario JSON file
        scenario: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = match cli.command {
        Commands::Extract {
            input,
            output_dir,
            name,
            min_confidence,
        } => extract(&input, &output_dir, name.as_deref(), min_confidence),
        Commands::Classify { expression } => {
            let classified = classify(&expression);
            match serde_json::to_string_pretty(&classified) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Error serializing classification: {e}");
                    process::exit(2);
                }
            }
            println!("helper: {}", render(&classified));
            0
        }
        Commands::Translate { expression } => match to_evaluable(&expression) {
            Ok(evaluable) => {
                println!("{evaluable}");
                0
            }
            Err(e) => {
                eprintln!("Cannot translate expression: {e}");
                1
            }
        },
        Commands::Test { scenario } => run_scenario(&scenario),
    };
    process::exit(code);
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn extract(input: &Path, output_dir: &Path, name: Option<&str>, min_confidence: f64) -> i32 {
    let content = match std::fs::read_to_string(input) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading {}: {e}", input.display());
            return 2;
        }
    };
    let rows: Vec<PgPolicyRow> = match serde_json::from_str(&content) {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!("Invalid pg_policies JSON in {}: {e}", input.display());
            return 2;
        }
    };
    let policies = match policies_from_rows(&rows) {
        Ok(policies) => policies,
        Err(e) => {
            eprintln!("Invalid policy: {e}");
            return 2;
        }
    };

    let classified = classify_policies(&policies);
    info!(policies = classified.len(), "classified policies");

    let name = name
        .map(str::to_string)
        .or_else(|| {
            input
                .file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "output".to_string());

    if let Err(e) = formatter::write_output(output_dir, &name, &policies, &classified) {
        eprintln!("Error writing output: {e}");
        return 2;
    }

    let below_min: Vec<_> = classified
        .iter()
        .filter(|cp| cp.min_confidence() < min_confidence)
        .collect();
    for cp in &below_min {
        eprintln!(
            "Policy '{}' on '{}' classified below {min_confidence}: {:.2}",
            cp.policy.name,
            cp.policy.table,
            cp.min_confidence()
        );
    }
    i32::from(!below_min.is_empty())
}

fn run_scenario(path: &Path) -> i32 {
    let scenario = match Scenario::from_path(path) {
        Ok(scenario) => scenario,
        Err(e) => {
            eprintln!("Error loading scenario: {e}");
            return 2;
        }
    };
    let report = match harness::run(&scenario) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Invalid scenario: {e}");
            return 2;
        }
    };
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error serializing report: {e}");
            return 2;
        }
    }
    i32::from(!report.passed)
}
