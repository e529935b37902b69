//! Finding the `weaver-worker` executable.

use std::env;
use std::env::consts::EXE_SUFFIX;
use std::path::{Path, PathBuf};

use weaver_core::{Error, Result};

/// Environment variable naming the worker executable.
pub const WORKER_PROGRAM_ENV: &str = "WEAVER_WORKER_BIN";

const WORKER_PROGRAM_NAME: &str = "weaver-worker";

/// Resolve the worker executable.
///
/// In order: the configured path, [`WORKER_PROGRAM_ENV`], then a
/// `weaver-worker` next to the running executable or one directory above it
/// (test binaries live in a `deps/` subdirectory of the target directory).
///
/// # Errors
/// Returns [`Error::WorkerStart`] if no candidate exists
pub fn locate_worker_program(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = env::var_os(WORKER_PROGRAM_ENV) {
        return Ok(PathBuf::from(path));
    }

    let exe = env::current_exe()
        .map_err(|err| Error::WorkerStart(format!("Cannot locate current executable: {err}")))?;
    let file_name = format!("{WORKER_PROGRAM_NAME}{EXE_SUFFIX}");
    exe.ancestors()
        .skip(1)
        .take(2)
        .map(|dir| dir.join(&file_name))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| {
            Error::WorkerStart(format!(
                "{file_name} not found near {}; set {WORKER_PROGRAM_ENV} or pool.worker_program",
                exe.display()
            ))
        })
}
