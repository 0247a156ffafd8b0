//! Content organizer: rearrange staged files into the generator's layout.
//!
//! The external generator discovers pages under `<build_input_root>/content/`.
//! Every destination path is re-validated against the build-input root before
//! writing, independently of the downloader's own checks.

use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use sitepress_shared::{ErrorKind, StageError, ValidationResult};
use sitepress_validate::validate_path;

/// Subdirectory of the build-input root the generator scans for pages.
const CONTENT_DIR: &str = "content";

/// Copy staged files into the generator's content layout.
///
/// Zero surviving files makes the result invalid — there is nothing to
/// build, which the orchestrator treats as a fatal precondition.
#[instrument(skip_all, fields(staged = %staged_dir.display()))]
pub fn organize_content(staged_dir: &Path, build_input_root: &Path) -> ValidationResult {
    let mut errors = Vec::new();
    let mut files_organized = 0usize;

    let content_root = build_input_root.join(CONTENT_DIR);
    if let Err(e) = std::fs::create_dir_all(&content_root) {
        errors.push(StageError::new(
            ErrorKind::ValidationFailure,
            format!("could not create content root: {e}"),
        ));
        return ValidationResult {
            valid: false,
            organized_path: None,
            files_organized: 0,
            errors,
        };
    }

    let mut staged_files = Vec::new();
    if let Err(e) = collect_files(staged_dir, staged_dir, &mut staged_files) {
        errors.push(StageError::new(
            ErrorKind::ValidationFailure,
            format!("could not read staging area: {e}"),
        ));
    }

    for relative in staged_files {
        let destination_rel = Path::new(CONTENT_DIR).join(&relative);

        // Independent of the downloader's validation: the organized path
        // must resolve inside the build-input root.
        if !validate_path(&destination_rel, build_input_root) {
            warn!(path = %relative.display(), "organized path rejected");
            errors.push(StageError::new(
                ErrorKind::ValidationFailure,
                format!("organized path escapes build root: {}", relative.display()),
            ));
            continue;
        }

        let source = staged_dir.join(&relative);
        let destination = build_input_root.join(&destination_rel);

        if let Some(parent) = destination.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                errors.push(StageError::new(
                    ErrorKind::ValidationFailure,
                    format!("organize failed: {}: {e}", relative.display()),
                ));
                continue;
            }
        }

        match std::fs::copy(&source, &destination) {
            Ok(_) => files_organized += 1,
            Err(e) => {
                errors.push(StageError::new(
                    ErrorKind::ValidationFailure,
                    format!("organize failed: {}: {e}", relative.display()),
                ));
            }
        }
    }

    let valid = files_organized > 0;
    info!(files_organized, errors = errors.len(), valid, "organize complete");

    ValidationResult {
        valid,
        organized_path: valid.then_some(content_root),
        files_organized,
        errors,
    }
}

/// Recursively collect file paths under `dir`, relative to `base`.
fn collect_files(base: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(base, &path, out)?;
        } else if let Ok(rel) = path.strip_prefix(base) {
            out.push(rel.to_path_buf());
        }
    }
    out.sort();
    Ok(())
}
