use anyhow::{Context, Result};
use convoscript::v1::{parse_document, summarize};
use serde_json::json;
use std::path::PathBuf;

use crate::input::read_script;

pub fn run(input: PathBuf, pretty: bool) -> Result<()> {
    let text = read_script(&input)?;
    println!("{}", render(&text, pretty)?);
    Ok(())
}

fn render(text: &str, pretty: bool) -> Result<String> {
    let parsed = parse_document(text).context("script does not parse")?;
    let doc = json!({
        "shape": parsed.shape,
        "summary": summarize(&parsed.tree),
        "phases": parsed.tree,
    });
    let json = if pretty {
        serde_json::to_string_pretty(&doc)?
    } else {
        serde_json::to_string(&doc)?
    };
    Ok(json)
}
