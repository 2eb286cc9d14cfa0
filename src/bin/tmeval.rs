//! tmeval - evaluate a document tree, or show its source view

#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use std::fs;
#[cfg(feature = "cli")]
use std::io::{self, Read};
#[cfg(feature = "cli")]
use std::sync::Arc;
#[cfg(feature = "cli")]
use typeset_env::{
    env::RealVfs, DisplayContext, DrdTable, Env, EvalConfig, InactiveMode, RefTables, Tree,
};

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "tmeval")]
#[command(version)]
#[command(about = "Evaluate document trees in a typesetting environment", long_about = None)]
struct Cli {
    /// Input file with one tree in s-expression syntax (reads from stdin if not provided)
    input_file: Option<String>,

    /// JSON file with the evaluation settings
    #[arg(long)]
    config: Option<String>,

    /// Inactive rewrite mode (inline-recurse, inline-once, inline-error,
    /// block-recurse, block-once, block-error)
    #[arg(long)]
    mode: Option<InactiveMode>,

    /// Show the source view highlighting TARGET instead of evaluating
    /// (`(arg x)`, `(value x)` or a macro name)
    #[arg(long, value_name = "TARGET")]
    inactive: Option<String>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Assign a variable before evaluation (NAME=TREE, repeatable)
    #[arg(long = "set", value_name = "NAME=TREE")]
    assignments: Vec<String>,

    /// Colour the diagnostics
    #[arg(short, long)]
    color: bool,
}

#[cfg(feature = "cli")]
fn main() -> io::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG controls the log level, warnings by default
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let (input, base) = match cli.input_file {
        Some(ref path) => (fs::read_to_string(path)?, path.clone()),
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            (buffer, "stdin.tm".to_string())
        }
    };

    let mut config = match cli.config {
        Some(ref path) => EvalConfig::from_json(&fs::read_to_string(path)?)
            .map_err(|e| invalid_input(format!("{}: {}", path, e)))?,
        None => EvalConfig::default(),
    };
    if let Some(mode) = cli.mode {
        config.inactive_mode = mode;
    }

    let tree = Tree::parse(&input).map_err(|e| invalid_input(format!("{}: {}", base, e)))?;

    let drd = DrdTable::new();
    let mut env = Env::new(DisplayContext::default(), &drd, base, RefTables::empty())
        .with_config(config)
        .with_vfs(Arc::new(RealVfs::new(".")));
    env.write_default_env();

    for assignment in &cli.assignments {
        let (name, value) = assignment
            .split_once('=')
            .ok_or_else(|| invalid_input(format!("expected NAME=TREE, got {}", assignment)))?;
        let value = Tree::parse(value)
            .map_err(|e| invalid_input(format!("bad value for {}: {}", name, e)))?;
        env.assign(name, &value);
    }

    let result = match cli.inactive {
        Some(ref target) => {
            let target =
                Tree::parse(target).map_err(|e| invalid_input(format!("bad target: {}", e)))?;
            env.rewrite_inactive(&tree, &target)
        }
        None => env.exec(&tree),
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&result.to_json())
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        println!("{}", json);
    } else {
        println!("{}", result);
    }

    for diagnostic in env.diagnostics() {
        if cli.color {
            eprintln!("{}{}\x1b[0m", diagnostic.color_code(), diagnostic);
        } else {
            eprintln!("{}", diagnostic);
        }
    }

    if env.has_errors() {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(feature = "cli")]
fn invalid_input(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, message)
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Build with --features cli");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  tmeval [OPTIONS] [INPUT_FILE]");
}
