//! # PID files: `{pid_dir}/{identifier}.pid` holding `"{pid}\n"`.
//!
//! A missing or malformed file means "not running". Deletion failures are logged,
//! never returned.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::SupervisorError;

/// Path of the PID file for `identifier` under `dir`.
pub fn path_for(dir: &Path, identifier: &str) -> PathBuf {
    dir.join(format!("{identifier}.pid"))
}

/// Creates the PID directory if missing; a fresh directory is made world-writable.
pub fn ensure_dir(dir: &Path) -> Result<(), SupervisorError> {
    if dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|source| SupervisorError::PidFile {
        path: dir.to_path_buf(),
        source,
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = fs::set_permissions(dir, fs::Permissions::from_mode(0o777)) {
            warn!(dir = %dir.display(), error = %e, "could not open up pid directory permissions");
        }
    }
    Ok(())
}

/// Reads the PID; `None` when the file is missing or does not hold a positive integer.
pub fn read(path: &Path) -> Option<u32> {
    let raw = fs::read_to_string(path).ok()?;
    match raw.trim().parse::<u32>() {
        Ok(pid) if pid > 0 => {
            debug!(pid, file = %path.display(), "PID read from file");
            Some(pid)
        }
        _ => {
            debug!(file = %path.display(), "ignoring malformed pid file");
            None
        }
    }
}

/// Writes `"{pid}\n"`.
pub fn write(path: &Path, pid: u32) -> Result<(), SupervisorError> {
    fs::write(path, format!("{pid}\n")).map_err(|source| SupervisorError::PidFile {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(pid, file = %path.display(), "Process ID written to file");
    Ok(())
}

/// Removes the file; absence is fine, other failures are only logged.
pub fn remove(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(file = %path.display(), error = %e, "could not delete pid file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = path_for(dir.path(), "scheduler");
        assert_eq!(read(&path), None);

        write(&path, 4242).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "4242\n");
        assert_eq!(read(&path), Some(4242));

        remove(&path);
        remove(&path);
        assert_eq!(read(&path), None);
    }

    #[test]
    fn malformed_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = path_for(dir.path(), "bad");
        for junk in ["", "abc\n", "-5\n", "0\n"] {
            fs::write(&path, junk).unwrap();
            assert_eq!(read(&path), None, "content {junk:?}");
        }
    }

    #[cfg(unix)]
    #[test]
    fn fresh_dir_is_world_writable() {
        use std::os::unix::fs::PermissionsExt;
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("a/daemon");
        ensure_dir(&dir).unwrap();
        let mode = fs::metadata(&dir).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o777);
        ensure_dir(&dir).unwrap();
    }
}
