use anyhow::{Context, Result};
use clap::Args;
use convoscript_editor::{ScriptWatcher, WatchReport, WatchStatus, WatcherConfig};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Script file to watch
    pub input: PathBuf,

    /// Quiet period after a change before re-checking, in milliseconds
    #[arg(long, default_value_t = 500)]
    pub debounce_ms: u64,

    /// Fallback poll interval, in milliseconds
    #[arg(long, default_value_t = 5000)]
    pub poll_ms: u64,

    /// Emit one JSON object per report
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: WatchArgs, pretty: bool) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(watch(args, pretty))
}

async fn watch(args: WatchArgs, pretty: bool) -> Result<()> {
    let config = WatcherConfig {
        poll_interval: Duration::from_millis(args.poll_ms),
        debounce: Duration::from_millis(args.debounce_ms),
    };
    let watcher = ScriptWatcher::new(&args.input, Some(config));
    let (tx, mut rx) = mpsc::channel(16);
    let handle = watcher
        .start(tx)
        .await
        .with_context(|| format!("failed to watch {}", args.input.display()))?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            report = rx.recv() => match report {
                Some(report) => println!("{}", render(&report, args.json, pretty)?),
                None => break,
            },
        }
    }

    handle.stop().await;
    Ok(())
}

fn render(report: &WatchReport, as_json: bool, pretty: bool) -> Result<String> {
    let path = report.path.display();
    if !as_json {
        return Ok(match &report.status {
            WatchStatus::Valid { summary, .. } => format!("{path}: valid ({summary})"),
            WatchStatus::Invalid { error, repairable } => {
                let hint = if *repairable {
                    " [fixable with `convoscript format --write`]"
                } else {
                    ""
                };
                format!("{path}: invalid: {error}{hint}")
            }
            WatchStatus::Unreadable(e) => format!("{path}: unreadable: {e}"),
        });
    }

    let value = match &report.status {
        WatchStatus::Valid { shape, summary } => json!({
            "path": report.path,
            "status": "valid",
            "shape": shape,
            "summary": summary,
        }),
        WatchStatus::Invalid { error, repairable } => json!({
            "path": report.path,
            "status": "invalid",
            "error": error.to_string(),
            "repairable": repairable,
        }),
        WatchStatus::Unreadable(e) => json!({
            "path": report.path,
            "status": "unreadable",
            "error": e,
        }),
    };
    Ok(if pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use convoscript::v1::{DocumentShape, ParseError, Summary};

    fn report(status: WatchStatus) -> WatchReport {
        WatchReport {
            path: PathBuf::from("s.yaml"),
            status,
        }
    }

    #[test]
    fn test_render_text() {
        let valid = report(WatchStatus::Valid {
            shape: Some(DocumentShape::Current),
            summary: Summary {
                phases: 1,
                topics: 2,
                actions: 3,
            },
        });
        assert_eq!(
            render(&valid, false, false).unwrap(),
            "s.yaml: valid (1 phases, 2 topics, 3 actions)"
        );

        let invalid = report(WatchStatus::Invalid {
            error: ParseError::Shape("no session".into()),
            repairable: true,
        });
        let line = render(&invalid, false, false).unwrap();
        assert!(line.starts_with("s.yaml: invalid: unsupported document shape"));
        assert!(line.ends_with("format --write`]"));
    }

    #[test]
    fn test_render_json() {
        let invalid = report(WatchStatus::Invalid {
            error: ParseError::Shape("no session".into()),
            repairable: false,
        });
        let value: serde_json::Value =
            serde_json::from_str(&render(&invalid, true, false).unwrap()).unwrap();
        assert_eq!(value["status"], "invalid");
        assert_eq!(value["repairable"], false);
    }
}
