//! Directory Lock
//!
//! One process at a time may own a data directory. The lock is an exclusive,
//! non-blocking `flock` on `{data_dir}/LOCK`, released when the file handle
//! is dropped (including when the process dies).

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

use crate::error::{Result, SeqlogError};

/// Held for as long as the engine is open
#[derive(Debug)]
pub struct DirLock {
    _file: File,
    path: PathBuf,
}

impl DirLock {
    pub const FILENAME: &'static str = "LOCK";

    /// Acquire the lock for `dir`, failing immediately if another holder exists
    ///
    /// The lock file records the holder's process ID for debugging.
    pub fn acquire(dir: &Path) -> Result<Self> {
        let path = dir.join(Self::FILENAME);

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;

        if let Err(e) = Self::try_lock(&file) {
            return match e.kind() {
                io::ErrorKind::WouldBlock => Err(SeqlogError::Locked(dir.to_path_buf())),
                _ => Err(SeqlogError::Io(e)),
            };
        }

        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        file.flush()?;

        Ok(Self { _file: file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(unix)]
    fn try_lock(file: &File) -> io::Result<()> {
        use libc::{flock, LOCK_EX, LOCK_NB};

        let result = unsafe { flock(file.as_raw_fd(), LOCK_EX | LOCK_NB) };
        if result != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    // Other platforms rely on the caller to avoid sharing a directory
    #[cfg(not(unix))]
    fn try_lock(_file: &File) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_acquire_fails_while_held() {
        let temp = TempDir::new().unwrap();

        let lock = DirLock::acquire(temp.path()).unwrap();
        assert!(lock.path().exists());
        assert!(matches!(
            DirLock::acquire(temp.path()),
            Err(SeqlogError::Locked(_))
        ));

        drop(lock);
        DirLock::acquire(temp.path()).unwrap();
    }
}
