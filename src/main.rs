//! tgr CLI: resolve, plan and validate fixtures.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::Result;

use tgr::answer::Answer;
use tgr::config::ReasonerConfig;
use tgr::fixture;
use tgr::reasoner::Reasoner;
use tgr::store::{GraphStore, MemGraph};

#[derive(Parser)]
#[command(name = "tgr", version, about = "Typed graph reasoner")]
struct Cli {
    /// Reasoner configuration (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the fixture's query and print its answers.
    Run {
        /// Fixture file (JSON).
        #[arg(long)]
        fixture: PathBuf,

        /// Stop after this many answers.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Print the resolution plan of the fixture's query.
    Plan {
        /// Fixture file (JSON).
        #[arg(long)]
        fixture: PathBuf,
    },

    /// Validate the fixture's rules.
    Validate {
        /// Fixture file (JSON).
        #[arg(long)]
        fixture: PathBuf,
    },
}

fn render(graph: &MemGraph, answer: &Answer) -> String {
    answer
        .iter()
        .map(|(var, id)| {
            let shown = match (graph.value_of(*id), graph.type_of(*id).and_then(|t| graph.label(t))) {
                (Some(value), _) => value.to_string(),
                (None, Some(label)) => label,
                (None, None) => "?".to_string(),
            };
            format!("{var} = {shown} ({id})")
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ReasonerConfig::load(path)?,
        None => ReasonerConfig::default(),
    };

    match cli.command {
        Commands::Run { fixture: path, limit } => {
            let loaded = fixture::load(&path)?;
            let reasoner = Reasoner::new(&loaded.graph, &loaded.arena, &loaded.rules, config);
            let limit = limit.unwrap_or(usize::MAX);
            let mut count = 0;
            for answer in reasoner.resolve(loaded.query)?.take(limit) {
                let answer = answer?;
                count += 1;
                println!("  {count}. {}", render(&loaded.graph, &answer));
            }
            println!(
                "{count} answer(s), {} inferred concept(s)",
                loaded.graph.inferred_count()
            );
        }

        Commands::Plan { fixture: path } => {
            let loaded = fixture::load(&path)?;
            let reasoner = Reasoner::new(&loaded.graph, &loaded.arena, &loaded.rules, config);
            let plan = reasoner.plan(loaded.query)?;
            let query = loaded.arena.query(loaded.query)?;
            println!("Resolution plan ({} atoms):", plan.len());
            println!("{}", plan.describe(query.atoms(), &loaded.graph));
        }

        Commands::Validate { fixture: path } => {
            let loaded = fixture::load(&path)?;
            let reasoner = Reasoner::new(&loaded.graph, &loaded.arena, &loaded.rules, config);
            let report = reasoner.validate_rules()?;
            if report.is_empty() {
                println!("{} rule(s), no problems found.", loaded.rules.len());
                return Ok(());
            }
            for (label, errors) in &report {
                println!("{label}:");
                for error in errors {
                    println!("  - {error}");
                }
            }
            miette::bail!("{} of {} rule(s) failed validation", report.len(), loaded.rules.len());
        }
    }

    Ok(())
}
