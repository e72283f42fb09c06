use anyhow::{Result, bail};
use convoscript::v1::{is_repairable, parse_document, summarize};
use std::path::PathBuf;

use crate::input::read_script;

pub fn run(input: PathBuf) -> Result<()> {
    let text = read_script(&input)?;
    match check(&text) {
        Ok(report) => {
            println!("{}: {report}", input.display());
            Ok(())
        }
        Err(message) => bail!("{}: {message}", input.display()),
    }
}

fn check(text: &str) -> std::result::Result<String, String> {
    match parse_document(text) {
        Ok(parsed) => Ok(format!("valid ({})", summarize(&parsed.tree))),
        Err(e) if is_repairable(text) => Err(format!(
            "{e}\nindentation repair fixes this; run `convoscript format --write`"
        )),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_valid() {
        let report = check("session:\n  session_id: s\n  phases: []\n").unwrap();
        assert_eq!(report, "valid (0 phases, 0 topics, 0 actions)");
    }

    #[test]
    fn test_check_suggests_format() {
        let bad = "actions:\n- action_id: a1\naction_type: ai_say\n  config:\ncontent: Hello\n";
        let err = check(&format!("session:\n  phases: []\n{bad}")).unwrap_err();
        assert!(err.contains("format --write"), "{err}");
    }

    #[test]
    fn test_check_shape_error() {
        let err = check("title: not a script\n").unwrap_err();
        assert!(err.contains("unsupported document shape"), "{err}");
        assert!(!err.contains("format --write"), "{err}");
    }

    #[test]
    fn test_check_no_hint_when_repair_yields_no_script() {
        // Repair makes this load as YAML, but it still has no `session`.
        let bad = "actions:\n- action_id: a1\naction_type: ai_say\n  config:\ncontent: Hello\n";
        let err = check(bad).unwrap_err();
        assert!(!err.contains("format --write"), "{err}");
    }
}
