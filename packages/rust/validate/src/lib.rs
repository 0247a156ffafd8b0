//! Security validation for externally-sourced names and paths.
//!
//! Pure functions, no I/O. Every filesystem or storage operation that uses
//! an externally-sourced name calls into this crate first; downstream stages
//! re-validate independently (defense in depth).

use std::path::{Component, Path, PathBuf};

/// Maximum accepted length for a blob name.
///
/// Generous for deep content trees, small enough to reject abuse.
const MAX_NAME_LEN: usize = 1024;

/// Check whether a blob name is safe to use as a relative path.
///
/// Rejects:
/// - empty names and names longer than [`MAX_NAME_LEN`]
/// - parent-directory segments (`..`)
/// - absolute prefixes (`/`, `\`, drive letters)
/// - null bytes and ASCII control characters
/// - characters outside the allow-list `[A-Za-z0-9._/ -]`
pub fn validate_blob_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return false;
    }

    if name.starts_with('/') || name.starts_with('\\') {
        return false;
    }

    // Windows-style absolute prefix (e.g. `C:`).
    if name.len() >= 2 && name.as_bytes()[1] == b':' {
        return false;
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | ' ' | '-'))
    {
        return false;
    }

    // Reject `..` as a path segment and empty segments (`//`).
    for segment in name.split('/') {
        if segment.is_empty() || segment == ".." || segment == "." {
            return false;
        }
    }

    true
}

/// Check that `candidate` resolves to a descendant of `allowed_root`.
///
/// The check is two-layered:
/// 1. Lexical: reject any `..` or root/prefix component before touching the
///    filesystem, so the resolution step never walks outside the root.
/// 2. Resolved: canonicalize the deepest existing ancestor of the joined
///    path and require it to stay under the canonicalized root. This defends
///    against symlink escapes planted inside the root.
pub fn validate_path(candidate: &Path, allowed_root: &Path) -> bool {
    if candidate.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    }) {
        return false;
    }

    let Ok(root) = allowed_root.canonicalize() else {
        tracing::debug!(root = %allowed_root.display(), "allowed root does not resolve");
        return false;
    };

    let joined = root.join(candidate);
    resolve_existing_prefix(&joined).starts_with(&root)
}

/// Canonicalize the deepest existing ancestor of `path`, then re-append the
/// non-existing tail lexically.
fn resolve_existing_prefix(path: &Path) -> PathBuf {
    let mut existing = path.to_path_buf();
    let mut tail: Vec<std::ffi::OsString> = Vec::new();

    while !existing.exists() {
        match existing.file_name() {
            Some(name) => {
                tail.push(name.to_os_string());
                existing.pop();
            }
            None => break,
        }
    }

    let mut resolved = existing.canonicalize().unwrap_or(existing);
    for part in tail.into_iter().rev() {
        resolved.push(part);
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_markdown_names() {
        assert!(validate_blob_name("index.md"));
        assert!(validate_blob_name("posts/2024/hello-world.md"));
        assert!(validate_blob_name("About Us.md"));
        assert!(validate_blob_name("_index.md"));
    }

    #[test]
    fn rejects_traversal_sequences() {
        assert!(!validate_blob_name("../../etc/passwd"));
        assert!(!validate_blob_name("posts/../../secret.md"));
        assert!(!validate_blob_name(".."));
    }

    #[test]
    fn rejects_absolute_prefixes() {
        assert!(!validate_blob_name("/etc/passwd"));
        assert!(!validate_blob_name("\\windows\\system32"));
        assert!(!validate_blob_name("C:/windows/system32"));
    }

    #[test]
    fn rejects_null_bytes_and_controls() {
        assert!(!validate_blob_name("file\0.md"));
        assert!(!validate_blob_name("file\n.md"));
    }

    #[test]
    fn rejects_disallowed_characters() {
        assert!(!validate_blob_name("post?.md"));
        assert!(!validate_blob_name("café.md"));
        assert!(!validate_blob_name("a|b.md"));
    }

    #[test]
    fn rejects_degenerate_segments() {
        assert!(!validate_blob_name(""));
        assert!(!validate_blob_name("a//b.md"));
        assert!(!validate_blob_name("./hidden.md"));
        assert!(!validate_blob_name(&"a".repeat(MAX_NAME_LEN + 1)));
    }

    #[test]
    fn path_inside_root_is_valid() {
        let root = tempfile::tempdir().expect("tempdir");
        assert!(validate_path(Path::new("content/index.md"), root.path()));
    }

    #[test]
    fn path_escaping_root_is_invalid() {
        let root = tempfile::tempdir().expect("tempdir");
        assert!(!validate_path(Path::new("../outside.md"), root.path()));
        assert!(!validate_path(Path::new("/etc/passwd"), root.path()));
    }

    #[test]
    fn symlink_escape_is_invalid() {
        let outside = tempfile::tempdir().expect("tempdir");
        let root = tempfile::tempdir().expect("tempdir");
        let link = root.path().join("escape");
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(outside.path(), &link).expect("symlink");
            assert!(!validate_path(Path::new("escape/file.md"), root.path()));
        }
    }

    #[test]
    fn missing_root_is_invalid() {
        assert!(!validate_path(
            Path::new("file.md"),
            Path::new("/nonexistent/sitepress/root")
        ));
    }
}
