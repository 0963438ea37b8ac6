//! piper CLI: minimal MeTTa interpreter.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use piper_metta::config::{SETTINGS_FILE, Settings};
use piper_metta::export::export_rules;
use piper_metta::interpreter::Interpreter;
use piper_metta::parse::parse_atom;
use piper_metta::seeds::SeedRegistry;

#[derive(Parser)]
#[command(name = "piper", version, about = "Minimal MeTTa interpreter")]
struct Cli {
    /// Settings file.
    #[arg(long, global = true, default_value = SETTINGS_FILE)]
    config: PathBuf,

    /// Directory scanned for external seed packs (overrides the settings file).
    #[arg(long, global = true)]
    seeds_dir: Option<PathBuf>,

    /// Evaluation step budget per top-level call (overrides the settings file).
    #[arg(long, global = true)]
    max_steps: Option<usize>,

    /// Start with an empty knowledge base instead of applying seed packs.
    #[arg(long, global = true)]
    no_seeds: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one atom, e.g. `piper eval '(chain (eval (+ 1 2)) $x (eval (+ $x 3)))'`.
    Eval {
        /// Atom in surface syntax.
        expr: String,

        /// Keep reducing until no further progress instead of a single step.
        #[arg(long)]
        reduce: bool,
    },

    /// Run a program file: load its rules, then print each `!` result.
    Run {
        /// Path to a program file.
        file: PathBuf,
    },

    /// Manage seed packs.
    Seed {
        #[command(subcommand)]
        action: SeedAction,
    },

    /// Export the knowledge base rules as JSON.
    Export {
        /// Program file whose rules are loaded before exporting.
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum SeedAction {
    /// List available seed packs.
    List,
    /// Validate and apply a seed pack, printing the report.
    Apply {
        /// Seed pack ID.
        id: String,
    },
}

/// Resolved settings with command-line overrides applied.
fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::load_or_default(&cli.config)?;
    if let Some(max_steps) = cli.max_steps {
        settings.override_max_steps(max_steps)?;
    }
    if cli.seeds_dir.is_some() {
        settings.seeds_dir = cli.seeds_dir.clone();
    }
    if cli.no_seeds {
        settings.seed_packs.clear();
    }
    Ok(settings)
}

fn seed_registry(settings: &Settings) -> SeedRegistry {
    match &settings.seeds_dir {
        Some(dir) => SeedRegistry::discover(dir),
        None => SeedRegistry::bundled(),
    }
}

/// Interpreter with the configured seed packs applied.
fn build_interpreter(settings: &Settings, registry: &SeedRegistry) -> Result<Interpreter> {
    let interp = Interpreter::new(settings.interpreter.clone());
    registry.apply_all(&settings.seed_packs, &interp)?;
    Ok(interp)
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
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    let registry = seed_registry(&settings);

    match cli.command {
        Commands::Eval { expr, reduce } => {
            let interp = build_interpreter(&settings, &registry)?;
            let atom = parse_atom(&expr)?;
            let result = if reduce {
                interp.reduce(&atom)
            } else {
                interp.execute(&atom)
            };
            println!("{result}");
        }

        Commands::Run { file } => {
            let interp = build_interpreter(&settings, &registry)?;
            let source = std::fs::read_to_string(&file).into_diagnostic()?;
            for result in interp.run_program(&source)? {
                println!("{result}");
            }
        }

        Commands::Seed { action } => match action {
            SeedAction::List => {
                let packs = registry.list();
                if packs.is_empty() {
                    println!("No seed packs available.");
                } else {
                    println!("Available seed packs ({}):", packs.len());
                    for pack in packs {
                        println!(
                            "  {} v{} - {} ({} rules)",
                            pack.id,
                            pack.version,
                            pack.description,
                            pack.rules.len()
                        );
                    }
                }
            }
            SeedAction::Apply { id } => {
                let interp = Interpreter::new(settings.interpreter.clone());
                let report = registry.apply(&id, &interp)?;
                println!(
                    "Applied seed \"{}\": {} rules added.",
                    report.id, report.rules_applied
                );
            }
        },

        Commands::Export { file } => {
            let interp = build_interpreter(&settings, &registry)?;
            if let Some(file) = file {
                let source = std::fs::read_to_string(&file).into_diagnostic()?;
                interp.run_program(&source)?;
            }
            let kb = interp
                .space()
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let json = serde_json::to_string_pretty(&export_rules(&kb)).into_diagnostic()?;
            println!("{json}");
        }
    }

    Ok(())
}
