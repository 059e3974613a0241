//! Path and filename validation
//!
//! Traversal checks run on the raw string before any normalization, so
//! sequences that a clean-up pass would fold away are still rejected.
//! Local paths are additionally confined to a base directory when one is
//! configured, with symlinks resolved on both sides of the comparison.

use std::path::{Path, PathBuf};

use crate::error::{Result, SshMcpError};

/// Maximum allowed filename length (standard filesystem limit)
pub const MAX_FILENAME_LENGTH: usize = 255;

/// Reject filenames that are too long, contain null bytes, path separators,
/// directory traversal, or control characters.
pub fn validate_filename(name: &str) -> Result<()> {
    let rune_count = name.chars().count();
    if rune_count > MAX_FILENAME_LENGTH {
        return Err(SshMcpError::validation(format!(
            "filename is too long ({} characters, max {})",
            rune_count, MAX_FILENAME_LENGTH
        )));
    }

    if name.contains('\0') {
        return Err(SshMcpError::validation("filename contains null bytes"));
    }

    if name.contains('/') || name.contains('\\') {
        return Err(SshMcpError::validation("filename contains path separator"));
    }

    if name.contains("..") {
        return Err(SshMcpError::validation(
            "filename contains directory traversal",
        ));
    }

    if let Some(c) = name.chars().find(|c| (*c as u32) < 0x20) {
        return Err(SshMcpError::validation(format!(
            "filename contains control character (0x{:02x})",
            c as u32
        )));
    }

    Ok(())
}

/// Reject paths with traversal attempts. The basename is filename-validated
/// unless it is `.` or `/`.
pub fn validate_path(p: &str) -> Result<()> {
    if p.contains('\0') {
        return Err(SshMcpError::validation(format!(
            "path {:?} contains null bytes",
            p
        )));
    }

    // Raw-string check, before any cleaning.
    if p.contains("..") {
        return Err(SshMcpError::validation(format!(
            "path {:?} contains directory traversal",
            p
        )));
    }

    let base = base_name(p);
    if base != "." && base != "/" && !base.is_empty() {
        validate_filename(base)
            .map_err(|e| SshMcpError::validation(format!("invalid filename in path: {}", e)))?;
    }

    Ok(())
}

/// Validate a local filesystem path. Null bytes and traversal are always
/// rejected. With a non-empty base dir the resolved path must stay inside it;
/// symlinks are resolved on the path (or its parent when the path does not
/// exist yet) so planted links cannot escape the jail.
pub fn validate_local_path(local_path: &str, base_dir: Option<&Path>) -> Result<()> {
    if local_path.contains('\0') {
        return Err(SshMcpError::validation("path contains null bytes"));
    }

    if local_path.contains("..") {
        return Err(SshMcpError::validation(format!(
            "path {:?} contains directory traversal",
            local_path
        )));
    }

    let Some(base_dir) = base_dir else {
        return Ok(());
    };

    let abs_path = absolutize(Path::new(local_path))?;
    let abs_base = absolutize(base_dir)?;

    let final_path = match std::fs::symlink_metadata(&abs_path) {
        Ok(_) => abs_path.canonicalize().map_err(|e| {
            SshMcpError::validation(format!(
                "failed to resolve symlinks for {:?}: {}",
                local_path, e
            ))
        })?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            // Path doesn't exist yet (upload target) - resolve the parent instead.
            match abs_path.parent() {
                Some(parent) if parent != Path::new("") && parent != Path::new("/") => {
                    let resolved_parent = parent.canonicalize().map_err(|e| {
                        SshMcpError::validation(format!(
                            "failed to resolve symlinks for parent of {:?}: {}",
                            local_path, e
                        ))
                    })?;
                    match abs_path.file_name() {
                        Some(name) => resolved_parent.join(name),
                        None => resolved_parent,
                    }
                }
                _ => abs_path.clone(),
            }
        }
        Err(e) => {
            return Err(SshMcpError::validation(format!(
                "failed to check path {:?}: {}",
                local_path, e
            )));
        }
    };

    if is_within(&final_path, &abs_base) {
        return Ok(());
    }

    // The base dir itself may be a symlink (macOS /var -> /private/var).
    let final_base = abs_base.canonicalize().map_err(|e| {
        SshMcpError::validation(format!(
            "failed to resolve symlinks for base {:?}: {}",
            base_dir, e
        ))
    })?;
    if is_within(&final_path, &final_base) {
        return Ok(());
    }

    Err(SshMcpError::validation(format!(
        "path {:?} (resolves to {:?}) is outside allowed base directory {:?}",
        local_path, final_path, base_dir
    )))
}

fn is_within(path: &Path, base: &Path) -> bool {
    path == base || path.starts_with(base)
}

fn absolutize(p: &Path) -> Result<PathBuf> {
    if p.is_absolute() {
        return Ok(p.to_path_buf());
    }
    let cwd = std::env::current_dir()
        .map_err(|e| SshMcpError::validation(format!("cannot resolve path {:?}: {}", p, e)))?;
    Ok(cwd.join(p))
}

/// Final component of a slash-separated path, ignoring a trailing slash.
fn base_name(p: &str) -> &str {
    if p == "/" {
        return "/";
    }
    let trimmed = p.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/";
    }
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_filename_ok() {
        assert!(validate_filename("report.txt").is_ok());
        assert!(validate_filename("with spaces.log").is_ok());
        assert!(validate_filename(".hidden").is_ok());
    }

    #[test]
    fn test_validate_filename_too_long() {
        let name = "a".repeat(256);
        assert!(validate_filename(&name).is_err());
        let name = "a".repeat(255);
        assert!(validate_filename(&name).is_ok());
    }

    #[test]
    fn test_validate_filename_multibyte_length() {
        // 255 multibyte runes are fine even though the byte length exceeds 255.
        let name = "\u{00e9}".repeat(255);
        assert!(validate_filename(&name).is_ok());
    }

    #[test]
    fn test_validate_filename_rejects() {
        assert!(validate_filename("has\0null").is_err());
        assert!(validate_filename("a/b").is_err());
        assert!(validate_filename("a\\b").is_err());
        assert!(validate_filename("..").is_err());
        assert!(validate_filename("a..b").is_err());
        assert!(validate_filename("tab\there").is_err());
        assert!(validate_filename("line\nbreak").is_err());
    }

    #[test]
    fn test_validate_path_ok() {
        assert!(validate_path("/etc/hosts").is_ok());
        assert!(validate_path("relative/file.txt").is_ok());
        assert!(validate_path("/").is_ok());
        assert!(validate_path(".").is_ok());
        assert!(validate_path("~/notes.txt").is_ok());
    }

    #[test]
    fn test_validate_path_traversal() {
        assert!(validate_path("../etc/passwd").is_err());
        assert!(validate_path("/var/../etc").is_err());
        assert!(validate_path("a/b/..").is_err());
    }

    #[test]
    fn test_validate_path_null() {
        assert!(validate_path("/tmp/\0file").is_err());
    }

    #[test]
    fn test_validate_path_checks_basename() {
        assert!(validate_path("/tmp/bad\x01name").is_err());
    }

    #[test]
    fn test_validate_local_path_no_base() {
        assert!(validate_local_path("/anywhere/at/all", None).is_ok());
        assert!(validate_local_path("../escape", None).is_err());
        assert!(validate_local_path("with\0null", None).is_err());
    }

    #[test]
    fn test_validate_local_path_inside_base() {
        let base = tempfile::tempdir().unwrap();
        let file = base.path().join("data.txt");
        std::fs::write(&file, b"x").unwrap();

        assert!(validate_local_path(file.to_str().unwrap(), Some(base.path())).is_ok());
        // Base dir itself is allowed.
        assert!(validate_local_path(base.path().to_str().unwrap(), Some(base.path())).is_ok());
    }

    #[test]
    fn test_validate_local_path_outside_base() {
        let base = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let file = other.path().join("data.txt");
        std::fs::write(&file, b"x").unwrap();

        assert!(validate_local_path(file.to_str().unwrap(), Some(base.path())).is_err());
    }

    #[test]
    fn test_validate_local_path_nonexistent_inside_base() {
        let base = tempfile::tempdir().unwrap();
        let target = base.path().join("new-upload.bin");
        assert!(validate_local_path(target.to_str().unwrap(), Some(base.path())).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_validate_local_path_symlink_escape() {
        let base = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let secret = outside.path().join("secret.txt");
        std::fs::write(&secret, b"top secret").unwrap();

        let link = base.path().join("innocent.txt");
        std::os::unix::fs::symlink(&secret, &link).unwrap();

        // The link lives inside the base dir but resolves outside it.
        assert!(validate_local_path(link.to_str().unwrap(), Some(base.path())).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_validate_local_path_symlinked_base_dir() {
        let real = tempfile::tempdir().unwrap();
        let holder = tempfile::tempdir().unwrap();
        let base_link = holder.path().join("base");
        std::os::unix::fs::symlink(real.path(), &base_link).unwrap();

        let file = real.path().join("inside.txt");
        std::fs::write(&file, b"x").unwrap();

        // Real path compared against a symlinked base dir still passes.
        assert!(validate_local_path(file.to_str().unwrap(), Some(base_link.as_path())).is_ok());
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("/a/b/c.txt"), "c.txt");
        assert_eq!(base_name("c.txt"), "c.txt");
        assert_eq!(base_name("/"), "/");
        assert_eq!(base_name("/a/b/"), "b");
    }
}
