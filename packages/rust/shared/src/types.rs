//! Core domain types for the SitePress publish pipeline.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one publish run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Error records
// ---------------------------------------------------------------------------

/// Classification of a pipeline failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Storage unreachable — fatal, no retry inside this core.
    AccessFailure,
    /// Bad blob name or path — per-file, non-fatal.
    ValidationFailure,
    /// Per-file size cap exceeded — non-fatal.
    SizeLimitExceeded,
    /// Generator exited non-zero or timed out — fatal for the run.
    BuildFailure,
    /// Per-file transfer failure (upload or download) — non-fatal unless
    /// every file fails.
    UploadFailure,
    /// Restore from backup failed — site left inconsistent.
    RollbackFailure,
}

impl ErrorKind {
    /// Whether this kind on its own makes the whole run a failure.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AccessFailure | Self::BuildFailure | Self::RollbackFailure
        )
    }
}

/// A correlated, sanitized error record.
///
/// Created at the point of failure, propagated upward, never mutated.
/// The message must not carry raw endpoints, credentials, or absolute
/// local paths — only blob-relative names and a human-readable cause.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageError {
    /// Opaque identifier for tracing this failure across logs.
    pub correlation_id: Uuid,
    /// Failure classification.
    pub kind: ErrorKind,
    /// Sanitized, human-readable message.
    pub message: String,
}

impl StageError {
    /// Create a new error record with a fresh correlation id.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            correlation_id: Uuid::now_v7(),
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for StageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {} ({})", self.kind, self.message, self.correlation_id)
    }
}

// ---------------------------------------------------------------------------
// Stage results
// ---------------------------------------------------------------------------

/// Metadata for one validated file in the local staging area.
///
/// `relative_path` is guaranteed free of traversal sequences and confined
/// to the staging root by the downloader's validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedFile {
    /// Path relative to the staging root.
    pub relative_path: String,
    /// Size of the downloaded content.
    pub size_bytes: u64,
    /// SHA-256 of the content, for traceability.
    pub content_hash: String,
}

/// Result of the download stage.
#[derive(Debug, Clone, Default)]
pub struct DownloadResult {
    /// Files staged, in listing order.
    pub files: Vec<StagedFile>,
    /// Count of files staged; always `<=` the configured maximum.
    pub files_downloaded: usize,
    /// Per-blob errors that did not abort the sweep.
    pub errors: Vec<StageError>,
}

/// Result of the organize stage.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Whether at least one file survived organization.
    pub valid: bool,
    /// Root of the organized content; always inside the build-input root.
    pub organized_path: Option<PathBuf>,
    /// Count of files placed into the generator layout.
    pub files_organized: usize,
    /// Per-file errors.
    pub errors: Vec<StageError>,
}

/// Result of the build stage.
#[derive(Debug, Clone)]
pub struct BuildResult {
    /// True only if the generator exited 0 within the timeout and produced
    /// a non-empty output tree.
    pub success: bool,
    /// Populated only when `success` is true.
    pub output_path: Option<PathBuf>,
    /// Wall-clock duration of the generator invocation.
    pub duration: Duration,
    /// Build errors (at most one fatal record in practice).
    pub errors: Vec<StageError>,
}

/// Result of a container-to-container or directory-to-container transfer.
///
/// Used for deployment, backup, and rollback alike: backup and rollback are
/// "deploy from container A to container B" with reversed direction.
#[derive(Debug, Clone, Default)]
pub struct DeploymentResult {
    /// Objects successfully transferred.
    pub files_uploaded: usize,
    /// Per-object errors that did not abort the sweep.
    pub errors: Vec<StageError>,
    /// Wall-clock duration of the transfer.
    pub duration: Duration,
}

// ---------------------------------------------------------------------------
// Pipeline state & final result
// ---------------------------------------------------------------------------

/// States of the publish pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Downloading,
    Organizing,
    Building,
    BackingUp,
    Deploying,
    RollingBack,
    Done,
    Failed,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Downloading => "downloading",
            Self::Organizing => "organizing",
            Self::Building => "building",
            Self::BackingUp => "backing_up",
            Self::Deploying => "deploying",
            Self::RollingBack => "rolling_back",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Final result of one publish run, returned by the orchestrator.
///
/// The orchestrator never raises — every failure is represented here.
#[derive(Debug, Clone)]
pub struct PublishResult {
    /// Identifier for this run.
    pub run_id: RunId,
    /// Terminal state: `Done` or `Failed`.
    pub state: PipelineState,
    /// Files staged by the download stage.
    pub files_downloaded: usize,
    /// Files that survived organization.
    pub files_organized: usize,
    /// Objects live on the hosting container after this run.
    pub files_uploaded: usize,
    /// Objects mirrored into the backup container before deploying.
    pub backup_files: usize,
    /// Whether a rollback was attempted.
    pub rolled_back: bool,
    /// Every error from every stage, in pipeline order.
    pub errors: Vec<StageError>,
    /// Total elapsed time.
    pub elapsed: Duration,
}

impl PublishResult {
    /// Whether the run published a usable site.
    ///
    /// Derivable signal per the error-handling contract: something was
    /// uploaded and no fatal error kind was recorded.
    pub fn succeeded(&self) -> bool {
        self.files_uploaded > 0 && !self.errors.iter().any(|e| e.kind.is_fatal())
    }

    /// Whether the run finished `Done` but with per-file warnings.
    pub fn partial(&self) -> bool {
        self.state == PipelineState::Done && !self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_roundtrip() {
        let id = RunId::new();
        let s = id.to_string();
        let parsed: RunId = s.parse().expect("parse RunId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn fatal_kinds() {
        assert!(ErrorKind::AccessFailure.is_fatal());
        assert!(ErrorKind::BuildFailure.is_fatal());
        assert!(ErrorKind::RollbackFailure.is_fatal());
        assert!(!ErrorKind::ValidationFailure.is_fatal());
        assert!(!ErrorKind::SizeLimitExceeded.is_fatal());
        assert!(!ErrorKind::UploadFailure.is_fatal());
    }

    #[test]
    fn stage_error_display_carries_correlation_id() {
        let err = StageError::new(ErrorKind::UploadFailure, "upload failed: index.html");
        let rendered = err.to_string();
        assert!(rendered.contains("index.html"));
        assert!(rendered.contains(&err.correlation_id.to_string()));
    }

    #[test]
    fn succeeded_requires_uploads_and_no_fatal_errors() {
        let base = PublishResult {
            run_id: RunId::new(),
            state: PipelineState::Done,
            files_downloaded: 3,
            files_organized: 3,
            files_uploaded: 10,
            backup_files: 8,
            rolled_back: false,
            errors: vec![],
            elapsed: Duration::from_secs(1),
        };
        assert!(base.succeeded());
        assert!(!base.partial());

        let mut warned = base.clone();
        warned
            .errors
            .push(StageError::new(ErrorKind::UploadFailure, "one object failed"));
        assert!(warned.succeeded());
        assert!(warned.partial());

        let mut failed = base.clone();
        failed.files_uploaded = 0;
        assert!(!failed.succeeded());

        let mut fatal = base;
        fatal
            .errors
            .push(StageError::new(ErrorKind::RollbackFailure, "restore failed"));
        assert!(!fatal.succeeded());
    }

    #[test]
    fn pipeline_state_serializes_snake_case() {
        let json = serde_json::to_string(&PipelineState::RollingBack).expect("serialize");
        assert_eq!(json, "\"rolling_back\"");
    }
}
