//! End-to-end publish pipeline: source container → staging → generator →
//! hosting container, with backup before deploy and rollback on
//! catastrophic deploy failure.
//!
//! The pipeline is strictly sequential; no stage begins before the previous
//! stage's result has been inspected. Only per-file transfers inside a stage
//! run concurrently, under a bounded worker pool.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, instrument, warn};

use sitepress_builder::{Generator, build_site};
use sitepress_ingest::{DownloadLimits, download_markdown_files, organize_content};
use sitepress_publish::{backup_current_site, deploy_directory, rollback_deployment};
use sitepress_shared::{
    ErrorKind, PipelineState, PublishConfig, PublishResult, Result, RunId, SitePressError,
    StageError,
};
use sitepress_storage::ObjectStore;

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called on every state transition.
    fn stage(&self, state: PipelineState);
    /// Called when the pipeline reaches a terminal state.
    fn done(&self, result: &PublishResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage(&self, _state: PipelineState) {}
    fn done(&self, _result: &PublishResult) {}
}

/// Per-run working directories under the configured work root.
struct RunDirs {
    run_dir: PathBuf,
    staging: PathBuf,
    build_input: PathBuf,
    output: PathBuf,
}

impl RunDirs {
    fn create(config: &PublishConfig, run_id: &RunId) -> Result<Self> {
        let run_dir = config.work_dir.join(run_id.to_string());
        let staging = run_dir.join("staging");
        let build_input = run_dir.join("site");
        let output = run_dir.join("public");

        for dir in [&staging, &build_input] {
            std::fs::create_dir_all(dir).map_err(|e| SitePressError::io(dir, e))?;
        }

        Ok(Self {
            run_dir,
            staging,
            build_input,
            output,
        })
    }
}

/// Run one full publish: download, organize, build, back up, deploy, and
/// roll back if the deploy fails catastrophically.
///
/// Never raises for pipeline failures — every error is aggregated into the
/// returned [`PublishResult`]. The only `Err` is a broken harness (the
/// per-run working directories cannot be created).
///
/// At most one run per site may be in flight; embedders must serialize
/// overlapping runs themselves.
#[instrument(skip_all, fields(source = %config.source_container, hosting = %config.hosting_container))]
pub async fn publish_site(
    config: &PublishConfig,
    store: Arc<dyn ObjectStore>,
    progress: &dyn ProgressReporter,
) -> Result<PublishResult> {
    let start = Instant::now();
    let run_id = RunId::new();
    let mut errors: Vec<StageError> = Vec::new();

    info!(%run_id, "starting publish run");
    let dirs = RunDirs::create(config, &run_id)?;

    // --- Download ---
    progress.stage(PipelineState::Downloading);
    let limits = DownloadLimits {
        max_files: config.max_files,
        max_file_size_bytes: config.max_file_size_bytes,
        concurrency: config.transfer_concurrency,
    };

    let download = match download_markdown_files(
        store.clone(),
        &config.source_container,
        &dirs.staging,
        limits,
    )
    .await
    {
        Ok(result) => result,
        Err(e) => {
            errors.push(StageError::new(ErrorKind::AccessFailure, e.to_string()));
            return Ok(finish(
                run_id, start, PipelineState::Failed, 0, 0, 0, 0, false, errors, &dirs, progress,
            ));
        }
    };
    errors.extend(download.errors.iter().cloned());
    let files_downloaded = download.files_downloaded;

    if files_downloaded == 0 {
        errors.push(StageError::new(
            ErrorKind::ValidationFailure,
            "no markdown files downloaded — nothing to publish",
        ));
        return Ok(finish(
            run_id, start, PipelineState::Failed, 0, 0, 0, 0, false, errors, &dirs, progress,
        ));
    }

    // --- Organize ---
    progress.stage(PipelineState::Organizing);
    let organized = organize_content(&dirs.staging, &dirs.build_input);
    errors.extend(organized.errors.iter().cloned());
    let files_organized = organized.files_organized;

    if !organized.valid {
        errors.push(StageError::new(
            ErrorKind::ValidationFailure,
            "no files survived organization — nothing to build",
        ));
        return Ok(finish(
            run_id,
            start,
            PipelineState::Failed,
            files_downloaded,
            0,
            0,
            0,
            false,
            errors,
            &dirs,
            progress,
        ));
    }

    // --- Build ---
    progress.stage(PipelineState::Building);
    let generator = Generator {
        bin: config.generator_bin.clone(),
        pinned_version: config.generator_version.clone(),
    };
    let build = build_site(&generator, &dirs.build_input, &dirs.output, config.build_timeout).await;
    errors.extend(build.errors.iter().cloned());

    if !build.success {
        // Unrecoverable precondition: nothing was published yet, so no
        // rollback is attempted and backup/deploy are skipped entirely.
        return Ok(finish(
            run_id,
            start,
            PipelineState::Failed,
            files_downloaded,
            files_organized,
            0,
            0,
            false,
            errors,
            &dirs,
            progress,
        ));
    }

    // --- Backup ---
    progress.stage(PipelineState::BackingUp);
    let backup = backup_current_site(
        store.as_ref(),
        &config.hosting_container,
        &config.backup_container,
    )
    .await;
    let backup_eligible = backup.errors.is_empty();
    if !backup_eligible {
        warn!(
            errors = backup.errors.len(),
            "backup failed or partial — proceeding without rollback eligibility"
        );
    }
    errors.extend(backup.errors.iter().cloned());
    let backup_files = backup.files_uploaded;

    // --- Deploy ---
    progress.stage(PipelineState::Deploying);
    let deploy = deploy_directory(
        store.clone(),
        &dirs.output,
        &config.hosting_container,
        config.transfer_concurrency,
    )
    .await;
    errors.extend(deploy.errors.iter().cloned());
    let files_uploaded = deploy.files_uploaded;

    if files_uploaded == 0 {
        // Catastrophic deployment failure: build output existed but nothing
        // went live.
        if backup_eligible {
            progress.stage(PipelineState::RollingBack);
            let rollback = rollback_deployment(
                store.as_ref(),
                &config.backup_container,
                &config.hosting_container,
            )
            .await;
            errors.extend(rollback.errors.iter().cloned());
            errors.push(StageError::new(
                ErrorKind::UploadFailure,
                "deployment failed — rolled back",
            ));
            if rollback.files_uploaded == 0 {
                errors.push(StageError::new(ErrorKind::RollbackFailure, "rollback failed"));
            }
            return Ok(finish(
                run_id,
                start,
                PipelineState::Failed,
                files_downloaded,
                files_organized,
                0,
                backup_files,
                true,
                errors,
                &dirs,
                progress,
            ));
        }

        errors.push(StageError::new(
            ErrorKind::UploadFailure,
            "deployment failed — no rollback available",
        ));
        return Ok(finish(
            run_id,
            start,
            PipelineState::Failed,
            files_downloaded,
            files_organized,
            0,
            backup_files,
            false,
            errors,
            &dirs,
            progress,
        ));
    }

    // Partial deployment is Done with warnings: the site is live but
    // incomplete, and overwriting it with the backup would be worse.
    Ok(finish(
        run_id,
        start,
        PipelineState::Done,
        files_downloaded,
        files_organized,
        files_uploaded,
        backup_files,
        false,
        errors,
        &dirs,
        progress,
    ))
}

#[allow(clippy::too_many_arguments)]
fn finish(
    run_id: RunId,
    start: Instant,
    state: PipelineState,
    files_downloaded: usize,
    files_organized: usize,
    files_uploaded: usize,
    backup_files: usize,
    rolled_back: bool,
    errors: Vec<StageError>,
    dirs: &RunDirs,
    progress: &dyn ProgressReporter,
) -> PublishResult {
    // Staged and generated files are ephemeral; drop them best-effort.
    if let Err(e) = std::fs::remove_dir_all(&dirs.run_dir) {
        warn!(error = %e, "failed to clean up run directory");
    }

    let result = PublishResult {
        run_id,
        state,
        files_downloaded,
        files_organized,
        files_uploaded,
        backup_files,
        rolled_back,
        errors,
        elapsed: start.elapsed(),
    };

    progress.stage(state);
    progress.done(&result);

    info!(
        run_id = %result.run_id,
        state = %result.state,
        downloaded = result.files_downloaded,
        organized = result.files_organized,
        uploaded = result.files_uploaded,
        backup = result.backup_files,
        rolled_back = result.rolled_back,
        errors = result.errors.len(),
        elapsed_ms = result.elapsed.as_millis(),
        "publish run finished"
    );

    result
}
