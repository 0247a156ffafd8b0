//! Site builder: invoke the external static-site generator.
//!
//! The generator runs as a subprocess with an explicit argument vector —
//! never a shell string — a fixed working directory, and a wall-clock
//! timeout. The only success signals consumed are the exit code and a
//! non-empty output tree.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::{info, instrument, warn};

use sitepress_shared::{BuildResult, ErrorKind, StageError};

/// The pinned external generator.
///
/// The binary and version come from configuration; the builder performs no
/// dynamic version resolution.
#[derive(Debug, Clone)]
pub struct Generator {
    /// Binary to invoke (PATH-resolved or absolute).
    pub bin: String,
    /// Expected `--version` output substring; empty disables the preflight.
    pub pinned_version: String,
}

/// Run the generator over `build_input_root`, writing into `output_root`.
///
/// A zero-exit-code run that produced an empty or absent output tree is a
/// failure: serving nothing is worse than failing loudly.
#[instrument(skip_all, fields(bin = %generator.bin, timeout_secs = timeout.as_secs()))]
pub async fn build_site(
    generator: &Generator,
    build_input_root: &Path,
    output_root: &Path,
    timeout: Duration,
) -> BuildResult {
    let start = Instant::now();

    if !generator.pinned_version.is_empty() {
        preflight_version(generator).await;
    }

    let mut child = match Command::new(&generator.bin)
        .arg("--source")
        .arg(build_input_root)
        .arg("--destination")
        .arg(output_root)
        .current_dir(build_input_root)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            return failed(
                start,
                format!("failed to spawn generator `{}`: {e}", generator.bin),
            );
        }
    };

    // Drain stderr concurrently so a chatty generator never blocks on a
    // full pipe while we wait for it to exit.
    let stderr = child.stderr.take();
    let stderr_task = tokio::spawn(read_stderr_tail(stderr));

    let status = tokio::select! {
        status = child.wait() => match status {
            Ok(status) => status,
            Err(e) => return failed(start, format!("generator wait failed: {e}")),
        },
        _ = tokio::time::sleep(timeout) => {
            warn!(timeout_secs = timeout.as_secs(), "generator timed out, killing");
            let _ = child.kill().await;
            stderr_task.abort();
            return failed(
                start,
                format!("generator timed out after {} seconds", timeout.as_secs()),
            );
        }
    };

    let stderr_tail = stderr_task.await.unwrap_or_default();

    if !status.success() {
        let code = status.code().map_or("signal".to_string(), |c| c.to_string());
        return failed(
            start,
            format!("generator exited with status {code}: {stderr_tail}"),
        );
    }

    if !output_tree_nonempty(output_root) {
        return failed(start, "generator exited 0 but produced no output".to_string());
    }

    let duration = start.elapsed();
    info!(duration_ms = duration.as_millis(), "build complete");

    BuildResult {
        success: true,
        output_path: Some(output_root.to_path_buf()),
        duration,
        errors: vec![],
    }
}

/// Run `bin --version` and warn if the pinned version is not reported.
///
/// Advisory only: a mismatch is logged, never fatal — the invocation itself
/// will fail on a genuinely broken binary.
async fn preflight_version(generator: &Generator) {
    let mut cmd = Command::new(&generator.bin);
    cmd.arg("--version")
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    match tokio::time::timeout(Duration::from_secs(10), cmd.output()).await {
        Ok(Ok(out)) => {
            let reported = String::from_utf8_lossy(&out.stdout);
            if !reported.contains(&generator.pinned_version) {
                warn!(
                    pinned = %generator.pinned_version,
                    reported = %reported.trim(),
                    "generator version does not match pinned version"
                );
            }
        }
        Ok(Err(e)) => warn!(error = %e, "generator version preflight failed"),
        Err(_) => warn!("generator version preflight timed out"),
    }
}

/// Read and trim the generator's stderr, keeping a bounded tail.
async fn read_stderr_tail(stderr: Option<tokio::process::ChildStderr>) -> String {
    use tokio::io::AsyncReadExt;

    let Some(mut stderr) = stderr else {
        return String::new();
    };

    let mut buf = String::new();
    let _ = stderr.read_to_string(&mut buf).await;

    let tail: Vec<&str> = buf.lines().rev().take(5).collect();
    tail.into_iter().rev().collect::<Vec<_>>().join(" | ")
}

/// Whether `output_root` exists and contains at least one file.
fn output_tree_nonempty(output_root: &Path) -> bool {
    fn any_file(dir: &Path) -> bool {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return false;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_file() {
                return true;
            }
            if path.is_dir() && any_file(&path) {
                return true;
            }
        }
        false
    }

    output_root.is_dir() && any_file(output_root)
}

fn failed(start: Instant, message: String) -> BuildResult {
    BuildResult {
        success: false,
        output_path: None,
        duration: start.elapsed(),
        errors: vec![StageError::new(ErrorKind::BuildFailure, message)],
    }
}
