//! Locating host programs and the cross toolchain

use crate::runtime::LaunchError;
use std::path::{Path, PathBuf};

/// Target triplet of the cross toolchain unless configured otherwise
pub const DEFAULT_TRIPLET: &str = "mipsel-unknown-elf";

/// Resolve `program` the way a shell would.
///
/// Names containing a path separator are checked as given; bare names are
/// searched for in every `PATH` entry.
pub fn find_program(program: impl AsRef<Path>) -> Option<PathBuf> {
    let program = program.as_ref();
    if program.components().count() > 1 {
        return is_executable(program).then(|| program.to_path_buf());
    }

    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Find the cross compiler for `triplet`, failing fast when it is missing
pub fn find_toolchain(triplet: &str) -> Result<PathBuf, LaunchError> {
    let compiler = format!("{}-gcc", triplet);
    match find_program(&compiler) {
        Some(path) => {
            log::debug!("Using cross compiler {}", path.display());
            Ok(path)
        }
        None => Err(LaunchError::ToolchainMissing(compiler)),
    }
}
