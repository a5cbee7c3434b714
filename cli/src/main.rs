//! graff command line host
//!
//! # Usage
//!
//! ```bash
//! # Compile a file and print the exported AST table
//! graff program.gf
//!
//! # Print the folded top-level values instead
//! graff program.gf --values
//!
//! # Print the highlighting class of every token
//! graff program.gf --tokens
//!
//! # Start an interactive session
//! graff
//! ```

use clap::Parser;
use graff::{Config, Diagnostic, Outcome, Session, Status};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Parser)]
#[command(
    name = "graff",
    version = env!("CARGO_PKG_VERSION"),
    about = "Compile graff programs to an exported AST table"
)]
struct Cli {
    /// Source file; starts a REPL when omitted
    file: Option<PathBuf>,

    /// Configuration file path (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print token classes per line instead of compiling
    #[arg(long, conflicts_with_all = ["values", "parsed"])]
    tokens: bool,

    /// Print the folded top-level values as s-expressions
    #[arg(long)]
    values: bool,

    /// Export the tree as parsed, before folding
    #[arg(long)]
    parsed: bool,

    /// Enable verbose logging (use multiple times for increased verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress everything but errors
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Error, Debug)]
enum CliError {
    #[error("{0}")]
    Graff(#[from] graff::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Line editor error: {0}")]
    Readline(#[from] ReadlineError),
}

type Result<T> = std::result::Result<T, CliError>;

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);
    run(cli)
}

fn run(cli: Cli) -> ExitCode {
    let result = load_config(cli.config.as_deref()).and_then(|config| match &cli.file {
        Some(path) => run_file(&cli, config, path),
        None => run_repl(config),
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Graff(e)) => {
            // Fatal language errors go out in the same shape as soft ones.
            print_diagnostic(&e.to_diagnostic());
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            debug!(path = %path.display(), "loading configuration");
            Ok(Config::from_path(path)?)
        }
        None => Ok(Config::default()),
    }
}

fn print_diagnostic(diagnostic: &Diagnostic) {
    match serde_json::to_string(diagnostic) {
        Ok(json) => eprintln!("{json}"),
        Err(_) => eprintln!("{}", diagnostic.message),
    }
}

// ============================================================================
// File mode
// ============================================================================

fn run_file(cli: &Cli, config: Config, path: &Path) -> Result<()> {
    let src = std::fs::read_to_string(path)?;
    let mut session = Session::new(config)?;

    if cli.tokens {
        for line in src.lines() {
            let highlights = session.parse_line(line);
            println!("{}", serde_json::to_string(&highlights)?);
        }
        return Ok(());
    }

    for line in src.lines() {
        session.parse_line(line);
    }
    let outcome = session.finish()?;
    for diagnostic in &outcome.diagnostics {
        warn!(line = diagnostic.from.line, "{}", diagnostic.message);
        print_diagnostic(diagnostic);
    }

    if cli.values {
        print_values(&session, &outcome.values);
    } else {
        let root = if cli.parsed { outcome.parsed } else { outcome.root };
        println!("{}", serde_json::to_string_pretty(&session.export(root))?);
    }
    Ok(())
}

fn print_values(session: &Session, values: &[graff::NodeId]) {
    for id in values {
        if let Some(tree) = session.pool().tree(*id) {
            println!("{tree}");
        }
    }
}

// ============================================================================
// REPL
// ============================================================================

fn history_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".graff_history"))
}

fn print_help() {
    println!("Lines are parsed as you enter them; values print as soon as they fold.");
    println!("  :help   - Show this help message");
    println!("  :reset  - Discard the buffer and start over");
    println!("  :export - Print the exported AST table for the buffer");
    println!("  :quit   - Exit");
    println!();
    println!("Examples:");
    println!("  1 + 2 ^ 3.");
    println!("  let double x = x + x.. double 4.");
    println!("  case 2 of 1: 10 of 2: 20 end.");
}

/// Fold a copy of the session, leaving the original open for more lines.
fn preview(session: &Session) -> graff::Result<(Session, Outcome)> {
    let mut copy = session.clone();
    let outcome = copy.finish()?;
    Ok((copy, outcome))
}

fn run_repl(config: Config) -> Result<()> {
    println!("graff {}", env!("CARGO_PKG_VERSION"));
    println!("Type :help for commands, or Ctrl+D to exit.");
    println!();

    let mut rl = DefaultEditor::new()?;
    let history = history_path();
    if let Some(path) = &history {
        // A missing history file is normal on first run.
        let _ = rl.load_history(path);
    }

    let mut session = Session::new(config)?;
    // Values and diagnostics already printed for this buffer
    let mut shown = 0;
    let mut reported = 0;

    loop {
        let line = match rl.readline("graff> ") {
            Ok(line) => line,
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => break,
            Err(e) => return Err(e.into()),
        };
        let _ = rl.add_history_entry(line.as_str());

        match line.trim() {
            ":help" => {
                print_help();
                continue;
            }
            ":quit" | ":exit" => break,
            ":reset" => {
                session.reset();
                shown = 0;
                reported = 0;
                continue;
            }
            ":export" => {
                match preview(&session) {
                    Ok((copy, outcome)) => {
                        println!("{}", serde_json::to_string_pretty(&copy.export(outcome.root))?)
                    }
                    Err(e) => println!("Error: {e}"),
                }
                continue;
            }
            _ => {}
        }

        let checkpoint = session.checkpoint();
        session.parse_line(&line);
        if session.state().status() == Status::Failed {
            if let Some(e) = session.state().fatal() {
                println!("Error: {e}");
            }
            session.restore(checkpoint);
            continue;
        }

        match preview(&session) {
            Ok((copy, outcome)) => {
                for diagnostic in outcome.diagnostics.get(reported..).unwrap_or_default() {
                    println!("Error: {}", diagnostic.message);
                }
                reported = outcome.diagnostics.len();
                print_values(&copy, outcome.values.get(shown..).unwrap_or_default());
                shown = outcome.values.len();
            }
            // Incomplete input folds once the rest of it arrives.
            Err(graff::Error::Syntax { .. }) => {}
            Err(e) => {
                println!("Error: {e}");
                session.restore(checkpoint);
            }
        }
    }

    if let Some(path) = &history
        && let Err(e) = rl.save_history(path)
    {
        warn!("could not save history: {e}");
    }
    Ok(())
}
