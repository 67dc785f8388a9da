use std::path::Path;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info, info_span, warn, Instrument};
use tracing_subscriber::EnvFilter;

use mas_agent::{Scheduler, SchedulerHandle, Termination, TraceEvent};
use mas_lang::LoadedSystem;

mod config;
mod error;

use config::{RunOptions, TraceFormat};
use error::Result;

#[derive(Parser)]
#[command(name = "mas")]
#[command(about = "Deterministic scheduler for BDI multi-agent systems", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a system until quiescence or the step limit
    Run(RunOptions),
    /// Parse and validate a system without running it
    Check {
        /// System file (`.toml` or `.mas2j`)
        file: std::path::PathBuf,
    },
}

fn init_logging(quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("warn")
    } else {
        EnvFilter::try_from_env("MAS_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.quiet);

    let result = match cli.command {
        Commands::Run(options) => {
            let run_id = uuid::Uuid::new_v4();
            run(options).instrument(info_span!("run", id = %run_id)).await
        }
        Commands::Check { file } => check(&file),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "mas failed");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(options: RunOptions) -> Result<()> {
    let system = mas_lang::load(&options.file)?;
    let config = options.scheduler_config(&system.settings);
    let seed = config.seed;
    let mut env = mas_env::create(&system.environment.kind, &system.environment.args, seed)?;
    let mut scheduler = Scheduler::from_system(&system, config)?;

    let handle = scheduler.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping");
            request_stop(&handle);
        }
    });

    let summary = scheduler.run(env.as_mut()).await;

    match options.trace {
        Some(TraceFormat::Text) => {
            for entry in scheduler.trace().entries() {
                println!("{}", entry);
            }
        }
        Some(TraceFormat::Json) => print!("{}", scheduler.trace().to_json_lines()?),
        None => {
            for entry in scheduler.trace().entries() {
                if let TraceEvent::Printed { text } = &entry.event {
                    println!("{}", text);
                }
            }
        }
    }

    match summary.termination {
        Termination::StepLimit => warn!(rounds = summary.rounds, "Step limit reached"),
        _ => info!(rounds = summary.rounds, termination = ?summary.termination, "Run complete"),
    }
    Ok(())
}

/// Asks the scheduler to stop after the current round. Returns false when
/// the scheduler is already gone.
fn request_stop(handle: &SchedulerHandle) -> bool {
    match handle.stop() {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Could not stop the scheduler");
            false
        }
    }
}

fn check(path: &Path) -> Result<()> {
    let system = mas_lang::load(path)?;
    mas_env::create(&system.environment.kind, &system.environment.args, system.settings.seed)?;
    Scheduler::from_system(&system, (&system.settings).into())?;
    println!("{}", describe(&system));
    Ok(())
}

fn describe(system: &LoadedSystem) -> String {
    let plans: usize = system.agents.iter().map(|a| a.source.plans.len()).sum();
    format!(
        "{}: {} agents, {} plans, environment {}",
        system.name,
        system.agents.len(),
        plans,
        system.environment.kind
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_options() {
        let cli = Cli::try_parse_from([
            "mas", "run", "sys.toml", "--seed", "7", "--policy", "priority", "--trace", "json", "-q",
        ])
        .unwrap();
        assert!(cli.quiet);
        let Commands::Run(opts) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(opts.seed, Some(7));
        assert_eq!(opts.policy, Some(mas_core::SchedulingPolicy::Priority));
        assert_eq!(opts.trace, Some(TraceFormat::Json));
    }

    #[test]
    fn test_bad_policy_rejected() {
        assert!(Cli::try_parse_from(["mas", "run", "sys.toml", "--policy", "fastest"]).is_err());
    }

    #[test]
    fn test_check_reports_malformed_plans() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.asl"), "+!g <- .print(").unwrap();
        let path = dir.path().join("sys.toml");
        std::fs::write(&path, "[mas]\nname = \"broken\"\n\n[[agent]]\nname = \"a\"\n").unwrap();

        let err = check(&path).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_check_rejects_non_ground_beliefs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sys.toml");
        std::fs::write(
            &path,
            "[mas]\nname = \"open\"\n\n[[agent]]\nname = \"a\"\nsource = \"+!g <- true.\"\nbeliefs = [\"count(X)\"]\n",
        )
        .unwrap();

        let err = check(&path).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_request_stop() {
        let scheduler = Scheduler::with_defaults();
        let handle = scheduler.handle();
        assert!(request_stop(&handle));
        drop(scheduler);
        assert!(!request_stop(&handle));
    }

    #[test]
    fn test_check_accepts_valid_system() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.asl"), "!g. +!g <- .print(hi).").unwrap();
        let path = dir.path().join("sys.toml");
        std::fs::write(
            &path,
            "[mas]\nname = \"ok\"\nenvironment = \"factory\"\n\n[[agent]]\nname = \"a\"\n",
        )
        .unwrap();

        assert!(check(&path).is_ok());
        let system = mas_lang::load(&path).unwrap();
        assert_eq!(describe(&system), "ok: 1 agents, 1 plans, environment factory");
    }

    #[tokio::test]
    async fn test_run_completes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.asl"), "!g. +!g <- .print(hi).").unwrap();
        let path = dir.path().join("sys.toml");
        std::fs::write(&path, "[mas]\nname = \"ok\"\n\n[[agent]]\nname = \"a\"\n").unwrap();

        let options = RunOptions {
            file: path,
            max_steps: Some(10),
            seed: None,
            policy: None,
            trace: Some(TraceFormat::Json),
        };
        assert!(run(options).await.is_ok());
    }
}
