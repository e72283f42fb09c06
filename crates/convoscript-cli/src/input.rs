//! Reading scripts and writing them back.

use anyhow::{Context, Result};
use similar::TextDiff;
use std::io::{self, Read};
use std::path::Path;

/// Read a script from a path, or from stdin for `-`.
pub fn read_script(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Display name of an input, used as the file name in the editor session.
pub fn display_name(path: &Path) -> String {
    if path.as_os_str() == "-" {
        return "stdin.yaml".to_string();
    }
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Replace a file's content atomically.
pub fn write_atomic(path: &Path, text: &str) -> Result<()> {
    anyhow::ensure!(path.as_os_str() != "-", "cannot write back to stdin");
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .context("failed to create temp file for atomic write")?;
    io::Write::write_all(&mut tmp, text.as_bytes()).context("failed to write temp file")?;
    tmp.persist(path)
        .with_context(|| format!("failed to persist {}", path.display()))?;
    Ok(())
}

/// Unified diff of two texts, `None` when they are equal.
pub fn compute_diff(old: &str, new: &str, name: &str) -> Option<String> {
    let diff = TextDiff::from_lines(old, new);
    let unified = diff
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{name}"), &format!("b/{name}"))
        .to_string();
    if unified.is_empty() {
        None
    } else {
        Some(unified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_diff() {
        assert_eq!(compute_diff("a\n", "a\n", "x.yaml"), None);
        let diff = compute_diff("a\nb\n", "a\nc\n", "x.yaml").unwrap();
        assert!(diff.contains("--- a/x.yaml"));
        assert!(diff.contains("-b"));
        assert!(diff.contains("+c"));
    }

    #[test]
    fn test_write_atomic_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.yaml");
        std::fs::write(&path, "old").unwrap();
        write_atomic(&path, "new").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name(Path::new("-")), "stdin.yaml");
        assert_eq!(display_name(Path::new("dir/intro.yaml")), "intro.yaml");
    }
}
