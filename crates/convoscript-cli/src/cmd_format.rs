use anyhow::{Context, Result, bail};
use clap::Args;
use convoscript::v1::format_text;
use std::path::PathBuf;
use tracing::info;

use crate::input::{compute_diff, display_name, read_script, write_atomic};

#[derive(Args, Debug)]
pub struct FormatArgs {
    /// Input file (use - for stdin)
    pub input: PathBuf,

    /// Write the formatted script back to the file
    #[arg(short, long)]
    pub write: bool,

    /// Print a unified diff instead of the formatted script
    #[arg(long, conflicts_with = "write")]
    pub diff: bool,

    /// Exit with an error if the script is not already formatted
    #[arg(long, conflicts_with_all = ["write", "diff"])]
    pub check: bool,
}

pub fn run(args: FormatArgs) -> Result<()> {
    let text = read_script(&args.input)?;
    let formatted = format_text(&text)
        .with_context(|| format!("cannot format {}", args.input.display()))?;
    if formatted.auto_fixed {
        info!(input = %args.input.display(), "indentation repaired");
        eprintln!("note: indentation was repaired automatically");
    }

    if args.check {
        if formatted.text != text {
            bail!("{} is not formatted", args.input.display());
        }
        return Ok(());
    }
    if args.diff {
        if let Some(diff) = compute_diff(&text, &formatted.text, &display_name(&args.input)) {
            print!("{diff}");
        }
        return Ok(());
    }
    if args.write {
        if formatted.text != text {
            write_atomic(&args.input, &formatted.text)?;
        }
        return Ok(());
    }
    print!("{}", formatted.text);
    Ok(())
}
