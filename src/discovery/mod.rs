//! Check discovery - scans the checks directory for runnable probe scripts.
//!
//! A file is a check iff it is a regular file, its name does not start with
//! `_`, and its first line begins with the `#!` interpreter directive. The
//! shebang predicate and the permission normalization are deliberately
//! separate functions so each can be tested on its own; [`discover`] is
//! only the walk driver composing them.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Execute bits OR'ed into discovered files when permission fixing is on.
const EXEC_BITS: u32 = 0o111;

/// One discovered check script.
///
/// `name` is the path relative to the checks root and is the stable
/// identifier joining discovery results, config overrides, and metric
/// labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckDescriptor {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to walk checks directory {}: {}", .0.display(), .1)]
    Walk(PathBuf, #[source] walkdir::Error),
}

/// Walk `root` and collect every check script under it.
///
/// Unreadable entries are logged and skipped; only a structural failure of
/// the walk itself (e.g. the root does not exist) is an error. With
/// `fix_permissions`, every regular file that survives the skip filters -
/// check or not - gets the execute bits added to its mode; a chmod failure
/// is logged and non-fatal.
pub fn discover(
    root: &Path,
    fix_permissions: bool,
) -> Result<Vec<CheckDescriptor>, DiscoveryError> {
    let mut checks = Vec::new();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                // The root itself failing is fatal; anything deeper is a
                // skipped subtree entry.
                if e.depth() == 0 {
                    return Err(DiscoveryError::Walk(root.to_path_buf(), e));
                }
                warn!(error = %e, "Failed to read directory entry, skipping");
                continue;
            }
        };

        let path = entry.path();

        if entry.file_type().is_dir() {
            debug!(path = %path.display(), "Skipping directory");
            continue;
        }

        if entry.file_name().to_string_lossy().starts_with('_') {
            debug!(path = %path.display(), "Skipping underscored file");
            continue;
        }

        if !entry.file_type().is_file() {
            debug!(path = %path.display(), "Skipping non-regular file");
            continue;
        }

        if has_interpreter_directive(path) {
            let name = path
                .strip_prefix(root)
                .unwrap_or(path)
                .to_string_lossy()
                .into_owned();
            checks.push(CheckDescriptor {
                name,
                path: path.to_path_buf(),
            });
        } else {
            debug!(path = %path.display(), "Skipping file without interpreter directive");
        }

        if fix_permissions {
            if let Err(e) = ensure_executable(path) {
                warn!(path = %path.display(), error = %e, "Failed to add executable permission");
            }
        }
    }

    Ok(checks)
}

/// Predicate: does the file's first line begin with `#!`?
///
/// Any failure to open or read the file answers `false` - an unreadable
/// file is not a check, and discovery carries on.
pub fn has_interpreter_directive(path: &Path) -> bool {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to open file");
            return false;
        }
    };

    // Byte-level read: check scripts may be any encoding past the shebang.
    let mut first_line = Vec::new();
    match BufReader::new(file).read_until(b'\n', &mut first_line) {
        Ok(_) => first_line.starts_with(b"#!"),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read first line");
            false
        }
    }
}

/// Action: OR the execute bits into the file's permission mode.
///
/// Idempotent - a second application leaves the mode unchanged.
pub fn ensure_executable(path: &Path) -> std::io::Result<()> {
    let metadata = fs::metadata(path)?;
    let mut permissions = metadata.permissions();
    let mode = permissions.mode();
    if mode & EXEC_BITS != EXEC_BITS {
        permissions.set_mode(mode | EXEC_BITS);
        fs::set_permissions(path, permissions)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn shebang_file_is_a_check() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "probe.sh", "#!/bin/sh\nexit 0\n");
        assert!(has_interpreter_directive(&path));
    }

    #[test]
    fn shebang_without_trailing_newline_is_a_check() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "probe.sh", "#!/bin/sh");
        assert!(has_interpreter_directive(&path));
    }

    #[test]
    fn plain_text_is_not_a_check() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "readme.txt", "just notes\n");
        assert!(!has_interpreter_directive(&path));
    }

    #[test]
    fn empty_file_is_not_a_check() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "empty", "");
        assert!(!has_interpreter_directive(&path));
    }

    #[test]
    fn missing_file_is_not_a_check() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!has_interpreter_directive(&dir.path().join("nope.sh")));
    }

    #[test]
    fn ensure_executable_sets_and_keeps_bits() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "probe.sh", "#!/bin/sh\n");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        ensure_executable(&path).unwrap();
        let once = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(once, 0o755);

        // OR-ing execute bits is idempotent.
        ensure_executable(&path).unwrap();
        let twice = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(twice, once);
    }

    #[test]
    fn discover_missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-such-dir");
        assert!(discover(&missing, false).is_err());
    }

    #[test]
    fn discover_names_are_root_relative() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("net")).unwrap();
        write_file(&dir.path().join("net"), "ping.sh", "#!/bin/sh\nexit 0\n");

        let checks = discover(dir.path(), false).unwrap();
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].name, "net/ping.sh");
        assert!(checks[0].path.ends_with("net/ping.sh"));
    }
}
