//! LaTeX → PDF through an external compiler process.
//!
//! The compiler runs in a fresh temporary directory with
//! `-interaction=nonstopmode -halt-on-error` so a broken document fails fast
//! instead of waiting for terminal input. A timeout kills the process.

use crate::error::UnitError;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

const JOB_NAME: &str = "poster";
const LOG_TAIL_LINES: usize = 40;

/// Compile `source` with `program` and return the PDF bytes.
pub async fn compile_latex(
    source: &str,
    program: &str,
    timeout_secs: u64,
) -> Result<Vec<u8>, UnitError> {
    let fail = |detail: String, log_tail: String| UnitError::Compilation { detail, log_tail };

    let dir = tempfile::tempdir().map_err(|e| fail(format!("temp dir: {e}"), String::new()))?;
    let tex_path = dir.path().join(format!("{JOB_NAME}.tex"));
    tokio::fs::write(&tex_path, source)
        .await
        .map_err(|e| fail(format!("write {}: {e}", tex_path.display()), String::new()))?;

    debug!("Running {} in {}", program, dir.path().display());
    let child = Command::new(program)
        .arg("-interaction=nonstopmode")
        .arg("-halt-on-error")
        .arg(format!("{JOB_NAME}.tex"))
        .current_dir(dir.path())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = match timeout(Duration::from_secs(timeout_secs), child).await {
        Err(_) => {
            return Err(fail(
                format!("{program} timed out after {timeout_secs}s"),
                read_log_tail(dir.path()).await,
            ))
        }
        Ok(Err(e)) => return Err(fail(format!("could not start {program}: {e}"), String::new())),
        Ok(Ok(output)) => output,
    };

    let pdf_path = dir.path().join(format!("{JOB_NAME}.pdf"));
    if !output.status.success() {
        let mut tail = read_log_tail(dir.path()).await;
        if tail.is_empty() {
            tail = tail_lines(&String::from_utf8_lossy(&output.stdout), LOG_TAIL_LINES);
        }
        warn!("{} exited with {}", program, output.status);
        return Err(fail(format!("{program} exited with {}", output.status), tail));
    }

    let pdf = tokio::fs::read(&pdf_path).await.map_err(|e| {
        fail(
            format!("{program} reported success but produced no PDF: {e}"),
            String::new(),
        )
    })?;
    info!("Poster compiled: {} bytes", pdf.len());
    Ok(pdf)
}

async fn read_log_tail(dir: &std::path::Path) -> String {
    match tokio::fs::read(dir.join(format!("{JOB_NAME}.log"))).await {
        Ok(bytes) => tail_lines(&String::from_utf8_lossy(&bytes), LOG_TAIL_LINES),
        Err(_) => String::new(),
    }
}

fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_keeps_last_lines() {
        let text = (1..=50).map(|i| i.to_string()).collect::<Vec<_>>().join("\n");
        let tail = tail_lines(&text, 3);
        assert_eq!(tail, "48\n49\n50");
        assert_eq!(tail_lines("a\nb", 10), "a\nb");
    }

    #[tokio::test]
    async fn missing_compiler_is_a_compilation_error() {
        let err = compile_latex("\\documentclass{article}", "no-such-latex-binary-xyz", 5)
            .await
            .unwrap_err();
        match err {
            UnitError::Compilation { detail, .. } => assert!(detail.contains("could not start")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
