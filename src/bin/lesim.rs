use clap::{command, Parser};
use lesim::{Error, ProgressReporter, Script, SimulationConfig};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the script
    script: PathBuf,

    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed used when the script sets no random_seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Print the whole output as JSON
    #[arg(long)]
    json: bool,

    /// Enable debug mode
    #[arg(short, long)]
    verbose: bool,
}

/// Writes status lines to stderr; Ctrl+C requests a stop.
struct ConsoleReporter {
    stop: AtomicBool,
}

impl ProgressReporter for ConsoleReporter {
    fn report_progress(&self, fraction: f64) {
        debug!("progress {:.0}%", fraction * 100.0);
    }

    fn report_status(&self, status: &str) {
        eprintln!("{}", status);
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

#[derive(Serialize)]
struct CommandOutput {
    line: usize,
    command: String,
    expression: String,
    series: lesim::Series,
}

async fn run(cli: &Cli) -> Result<(), Error> {
    // Load config
    let mut config = match &cli.config {
        Some(path) => SimulationConfig::from_file(&path.to_string_lossy())?,
        None => SimulationConfig::default(),
    };
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    info!("config loaded.");
    debug!("config: {:?}", config);

    let text = std::fs::read_to_string(&cli.script)
        .map_err(|e| Error::Internal(format!("Failed to read script file: {}", e)))?;
    debug!("Compiling script: {:?}", cli.script);
    let script = Script::compile(&text)?;

    let reporter = Arc::new(ConsoleReporter {
        stop: AtomicBool::new(false),
    });
    let signal_reporter = Arc::clone(&reporter);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Stop requested, finishing current step...");
            signal_reporter.stop.store(true, Ordering::SeqCst);
        }
    });

    let output = script.run(&config, reporter).await?;

    let mut commands = Vec::new();
    for command in &script.commands {
        for (expression, series) in command.evaluate(&output)? {
            commands.push(CommandOutput {
                line: command.line,
                command: command.kind.to_string(),
                expression,
                series,
            });
        }
    }

    if cli.json {
        let json = serde_json::json!({ "runs": output.runs, "commands": commands });
        let text = serde_json::to_string_pretty(&json)
            .map_err(|e| Error::Internal(format!("Failed to serialize output: {}", e)))?;
        println!("{}", text);
        return Ok(());
    }

    for run in &output.runs {
        let steps: Vec<String> = run.subjects.iter().map(|s| s.n_steps().to_string()).collect();
        println!(
            "{}: {} subject(s), steps per subject: {}",
            run.label,
            run.subjects.len(),
            steps.join(", ")
        );
    }
    for command in &commands {
        let length = match &command.series {
            lesim::Series::One(values) => values.len(),
            lesim::Series::PerSubject(all) => all.iter().map(Vec::len).max().unwrap_or(0),
        };
        println!(
            "line {}: {} {} ({} values)",
            command.line, command.command, command.expression, length
        );
    }
    if script.runs.is_empty() {
        warn!("script declares no @run");
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(&cli).await {
        Ok(()) => {}
        Err(e) if e.is_interrupted() => {
            info!("simulation stopped on request");
            eprintln!("Simulation interrupted.");
            std::process::exit(130);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
