//! Daemonization: fork-detach plus an exclusive pidfile lock, so only one
//! instance runs against a given pidfile at a time. Grounded on
//! `skynet_daemon.c`, reimplemented over `nix` (already the OS-interface
//! crate the teacher pulls in) instead of raw libc calls.

use std::io::Write;
use std::os::unix::io::RawFd;
use std::path::Path;

use nix::fcntl::{Flock, FlockArg, OFlag};
use nix::sys::stat::Mode;
use nix::unistd::{self, ForkResult};

use crate::error::StartupError;

/// Acquire an exclusive, non-blocking lock on `pidfile`, truncate it, and
/// write the current pid. Held for the remaining lifetime of the process
/// (the returned `Flock` releases the lock on drop). Fails with
/// `PidfileLocked` carrying the pid already holding it, when readable.
pub fn acquire_pidfile(pidfile: &Path) -> Result<Flock<std::fs::File>, StartupError> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(pidfile)
        .map_err(StartupError::Daemonize)?;

    match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
        Ok(mut locked) => {
            locked.set_len(0).map_err(StartupError::Daemonize)?;
            write!(locked, "{}", unistd::getpid()).map_err(StartupError::Daemonize)?;
            locked.flush().map_err(StartupError::Daemonize)?;
            Ok(locked)
        }
        Err((_file, _errno)) => {
            let holder = std::fs::read_to_string(pidfile).ok().and_then(|s| s.trim().parse::<i32>().ok()).unwrap_or(-1);
            Err(StartupError::PidfileLocked(pidfile.to_path_buf(), holder))
        }
    }
}

/// Fork once and exit the parent, detaching the child into its own session.
/// Mirrors `daemon_init`'s classic double-step (fork, `setsid`) without the
/// historical second fork (no controlling-terminal reacquisition risk on
/// Linux once `setsid` has run).
///
/// # Safety
/// Must be called before any other threads are spawned — `fork()` in a
/// multi-threaded process only duplicates the calling thread, which would
/// leave the child with a corrupted runtime.
pub unsafe fn detach() -> Result<(), StartupError> {
    match unistd::fork().map_err(|e| StartupError::Daemonize(std::io::Error::from(e)))? {
        ForkResult::Parent { .. } => std::process::exit(0),
        ForkResult::Child => {
            unistd::setsid().map_err(|e| StartupError::Daemonize(std::io::Error::from(e)))?;
            Ok(())
        }
    }
}

/// Redirect stdin/stdout/stderr to `/dev/null`, matching `daemon_init`'s
/// `redirect_fds` so a detached process doesn't hold the original
/// controlling terminal's descriptors open. Call once, after `detach()`.
pub fn redirect_fds() -> Result<(), StartupError> {
    let null_fd: RawFd =
        nix::fcntl::open("/dev/null", OFlag::O_RDWR, Mode::empty()).map_err(|e| StartupError::Daemonize(std::io::Error::from(e)))?;
    for target in [0, 1, 2] {
        if target != null_fd {
            unistd::dup2(null_fd, target).map_err(|e| StartupError::Daemonize(std::io::Error::from(e)))?;
        }
    }
    if null_fd > 2 {
        let _ = unistd::close(null_fd);
    }
    Ok(())
}

/// Remove the pidfile. Called during shutdown, mirroring `daemon_exit`'s
/// unlink; best-effort, since a missing file at this point isn't an error.
pub fn release_pidfile(pidfile: &Path) {
    let _ = std::fs::remove_file(pidfile);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pidfile_records_current_pid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harbor.pid");
        let locked = acquire_pidfile(&path).unwrap();
        drop(locked);
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.trim(), unistd::getpid().to_string());
    }

    #[test]
    fn second_lock_attempt_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harbor.pid");
        let _first = acquire_pidfile(&path).unwrap();
        let second = acquire_pidfile(&path);
        assert!(matches!(second, Err(StartupError::PidfileLocked(_, _))));
    }

    #[test]
    fn release_pidfile_removes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harbor.pid");
        let locked = acquire_pidfile(&path).unwrap();
        drop(locked);
        assert!(path.exists());
        release_pidfile(&path);
        assert!(!path.exists());
    }
}
