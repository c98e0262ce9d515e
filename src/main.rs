use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use goalflow_agent::{
    offline_evaluate, Orchestrator, RunOutcome, TraceLog, TracingInterceptor,
};
use goalflow_core::config::{dirs_home, AppConfig};
use goalflow_core::types::ToolOutput;
use goalflow_tools::lookup::create_lookup;
use goalflow_tools::{FsModelWriter, HandlerRegistry};

#[derive(Parser)]
#[command(name = "goalflow", version, about = "Route goals to tools, check the result, retry")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "goalflow.toml")]
    config: PathBuf,

    /// Verbose logging (same as RUST_LOG=goalflow=debug)
    #[arg(long, env = "DEBUG")]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single goal and print the outcome
    Run {
        /// The goal, e.g. "2+3*5" or "find tokio select docs". Read from stdin if empty.
        #[arg(trailing_var_arg = true)]
        goal: Vec<String>,
        /// Caller identity stored in the run context
        #[arg(short, long)]
        user: Option<String>,
        /// Override run.max_attempts
        #[arg(long)]
        max_attempts: Option<u32>,
        /// Print the full outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run each handler once on a fixed case
    Eval,
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.debug {
        "goalflow=debug,warn"
    } else {
        "goalflow=info,warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    // Handle completions before config loading
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "goalflow", &mut std::io::stdout());
        return Ok(());
    }

    let mut config = load_config(&cli.config)?;
    config.apply_env();
    config.validate()?;

    match cli.command {
        Commands::Config => {
            let mut shown = config.clone();
            redact(&mut shown.model.api_key);
            redact(&mut shown.search.api_key);
            println!("{}", toml::to_string_pretty(&shown)?);
        }
        Commands::Eval => {
            let registry = build_registry(&config)?;
            let report = offline_evaluate(&registry).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if report.iter().any(|c| !c.passed) {
                std::process::exit(1);
            }
        }
        Commands::Run {
            goal,
            user,
            max_attempts,
            json,
        } => {
            let mut goal = goal.join(" ");
            if goal.trim().is_empty() {
                goal = io::stdin()
                    .lock()
                    .lines()
                    .map_while(|l| l.ok())
                    .collect::<Vec<_>>()
                    .join("\n");
            }
            if goal.trim().is_empty() {
                anyhow::bail!("no goal given");
            }
            if let Some(n) = max_attempts {
                config.run.max_attempts = n;
                config.validate()?;
            }

            let registry = build_registry(&config)?;
            let generator = goalflow_llm::create_generator(&config.model);
            if generator.is_none() {
                warn!("No generator configured (set GROQ_API_KEY); using local extraction only");
            }

            let mut builder = Orchestrator::builder(registry)
                .with_config(&config)
                .maybe_generator(generator)
                .interceptor(Arc::new(TracingInterceptor));

            let mut trace_writer = None;
            if let Some(dir) = config.trace_dir() {
                let (trace, handle) = TraceLog::spawn(dir);
                builder = builder.interceptor(Arc::new(trace));
                trace_writer = Some(handle);
            }

            let orchestrator = builder.build()?;
            let outcome = orchestrator.run(goal.trim(), user.as_deref()).await;

            // Close the trace channel so the writer drains and exits.
            drop(orchestrator);
            if let Some(handle) = trace_writer {
                handle.await.ok();
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_outcome(&outcome);
            }
            if !outcome.accepted {
                std::process::exit(1);
            }
        }
        // Handled before config loading
        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// `--config` if present, then `~/.goalflow/config.toml`, then defaults.
fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        info!(path = %path.display(), "Loading config");
        return Ok(AppConfig::load(path)?);
    }
    if let Some(home_config) = dirs_home().map(|h| h.join(".goalflow").join("config.toml")) {
        if home_config.exists() {
            info!(path = %home_config.display(), "Loading config from home directory");
            return Ok(AppConfig::load(&home_config)?);
        }
    }
    info!("No config file found, using defaults and environment");
    Ok(AppConfig::default())
}

fn build_registry(config: &AppConfig) -> anyhow::Result<HandlerRegistry> {
    let lookup = create_lookup(&config.search)?;
    let writer = Arc::new(FsModelWriter::new(config.model_dir()));
    Ok(
        HandlerRegistry::with_builtins(lookup, config.search.max_results, writer)
            .with_max_timeout(config.run.handler_timeout_secs),
    )
}

fn redact(secret: &mut Option<String>) {
    if secret.is_some() {
        *secret = Some("***".to_string());
    }
}

fn print_outcome(outcome: &RunOutcome) {
    let tool = outcome
        .selected_tool
        .map(|t| t.to_string())
        .unwrap_or_else(|| "none".to_string());

    match &outcome.result {
        Some(ToolOutput::Calc {
            expression,
            value,
            explanation,
        }) if outcome.accepted => {
            println!("{} = {}", expression, value);
            if let Some(text) = explanation {
                println!("{}", text);
            }
        }
        Some(ToolOutput::Search { query, snippets }) if outcome.accepted => {
            println!("Results for \"{}\":", query);
            for hit in snippets {
                println!("- {} <{}>\n  {}", hit.title, hit.link, hit.snippet);
            }
        }
        Some(ToolOutput::Model {
            path, model_name, ..
        }) if outcome.accepted => {
            println!("Wrote dbt model {} to {}", model_name, path);
        }
        _ => {
            eprintln!(
                "Gave up after {} of {} attempts ({}).",
                outcome.attempts, outcome.max_attempts, tool
            );
        }
    }

    for error in &outcome.errors {
        eprintln!("  [{:?} #{}] {}", error.kind, error.cycle + 1, error.message);
    }
}
