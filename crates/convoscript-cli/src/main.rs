mod cmd_edit;
mod cmd_format;
mod cmd_parse;
mod cmd_validate;
mod cmd_watch;
mod input;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "convoscript")]
#[command(about = "Parse, validate, format, and edit conversation scripts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// More log output on stderr (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the Phase/Topic/Action tree of a script as JSON
    Parse {
        /// Input file (use - for stdin)
        input: PathBuf,
    },
    /// Check that a script parses
    Validate {
        /// Input file (use - for stdin)
        input: PathBuf,
    },
    /// Re-render a script canonically, repairing indentation if needed
    Format {
        #[command(flatten)]
        args: cmd_format::FormatArgs,
    },
    /// Apply one structural edit to a script
    Edit {
        /// Script file
        input: PathBuf,

        #[command(subcommand)]
        op: cmd_edit::EditOp,

        /// Write the result back to the file instead of stdout
        #[arg(short, long, global = true)]
        write: bool,

        /// Print a unified diff instead of the edited script
        #[arg(long, global = true)]
        diff: bool,
    },
    /// Watch a script and report its status whenever it changes
    Watch {
        #[command(flatten)]
        args: cmd_watch::WatchArgs,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Parse { input } => cmd_parse::run(input, cli.pretty),
        Commands::Validate { input } => cmd_validate::run(input),
        Commands::Format { args } => cmd_format::run(args),
        Commands::Edit {
            input,
            op,
            write,
            diff,
        } => cmd_edit::run(input, op, write, diff),
        Commands::Watch { args } => cmd_watch::run(args, cli.pretty),
    }
}
