use std::{
    fs::OpenOptions,
    io::{self, Write},
    path::PathBuf,
};

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use library_catalog::{
    Catalog, JsonLinesAuditSink, TracingAuditSink,
    console::{ConfirmationGate, Console, HELP},
};

/// Command-line arguments for the interactive catalog
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// User registered and logged in at start-up
    #[arg(short, long, default_value = "default_user")]
    user: String,

    /// Append one JSON line per catalog mutation to this file
    #[arg(long, value_name = "PATH")]
    audit_log: Option<PathBuf>,

    /// Remove books without asking for confirmation
    #[arg(short, long)]
    yes: bool,

    /// Log catalog internals at debug level (RUST_LOG still applies)
    #[arg(short, long)]
    verbose: bool,
}

/// Asks on stdin before destructive commands
#[derive(Debug)]
struct PromptGate {
    /// Skip the question and approve
    assume_yes: bool,
}

impl ConfirmationGate for PromptGate {
    fn confirm(&mut self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        print!("{prompt}");
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        io::stdin()
            .read_line(&mut answer)
            .is_ok_and(|_| matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
    }
}

/// Initialize the tracing subscriber, writing to stderr
fn init_tracing(verbose: bool) -> Result<()> {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::WARN };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {e}"))
}

/// Build the catalog with its sinks and the start-up user
fn build_catalog(args: &Args) -> Result<Catalog> {
    let mut catalog = Catalog::new();
    catalog.register_sink(Box::new(TracingAuditSink));

    if let Some(path) = &args.audit_log {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open audit log {}", path.display()))?;
        catalog.register_sink(Box::new(JsonLinesAuditSink::new(file)));
    }

    catalog.add_user(&args.user)?;
    catalog.login(&args.user)?;
    Ok(catalog)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose)?;

    let catalog = build_catalog(&args)?;
    let mut console = Console::new(catalog, PromptGate { assume_yes: args.yes });

    println!("{}", "Welcome to the library catalog!".green().bold());
    println!("{HELP}");
    println!("Current user: {}", args.user.cyan());

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush().context("Failed to flush stdout")?;

        line.clear();
        let read = stdin.read_line(&mut line).context("Failed to read from stdin")?;
        if read == 0 {
            println!("\nGoodbye!");
            break;
        }

        let reply = console.handle_line(&line);
        for text in &reply.lines {
            if reply.is_error {
                println!("{}", text.red());
            } else {
                println!("{text}");
            }
        }
        if reply.quit {
            break;
        }
    }

    Ok(())
}
