//! Per-invocation scratch directories
//!
//! A [`Workspace`] is exclusively owned by one translation or generation
//! call. It is removed by [`Workspace::release`] or, failing that, when
//! dropped, unless retention was requested.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Result, YangError};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Uniquely named scratch directory holding intermediate artifacts
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    keep: bool,
    released: bool,
}

impl Workspace {
    /// Create `<base>/<uuid>`, creating `base` as needed
    pub fn acquire(base: impl AsRef<Path>, keep: bool) -> Result<Self> {
        let root = base.as_ref().join(Uuid::new_v4().to_string());
        fs::create_dir_all(&root)?;
        debug!(workspace = %root.display(), "acquired workspace");
        Ok(Self {
            root,
            keep,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn keeps_files(&self) -> bool {
        self.keep
    }

    /// Fresh, unused file path with the given extension
    pub fn artifact(&self, extension: &str) -> PathBuf {
        self.root
            .join(format!("{}.{extension}", Uuid::new_v4()))
    }

    /// Named subdirectory, created on first use
    pub fn subdir(&self, name: &str) -> Result<PathBuf> {
        let dir = self.root.join(name);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Write `contents` to a new artifact and return its path
    pub fn write_artifact(&self, extension: &str, contents: impl AsRef<[u8]>) -> Result<PathBuf> {
        let path = self.artifact(extension);
        fs::write(&path, contents)?;
        debug!(artifact = %path.display(), "wrote artifact");
        Ok(path)
    }

    /// Remove a single artifact unless files are kept
    pub fn discard(&self, artifact: &Path) {
        if self.keep {
            return;
        }
        if let Err(e) = fs::remove_file(artifact) {
            if e.kind() != ErrorKind::NotFound {
                warn!(artifact = %artifact.display(), error = %e, "failed to remove artifact");
            }
        }
    }

    /// Delete the directory tree. Safe to call repeatedly.
    pub fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        if self.keep {
            info!(workspace = %self.root.display(), "keeping temporary files");
            return Ok(());
        }

        match fs::remove_dir_all(&self.root) {
            Ok(()) => {
                debug!(workspace = %self.root.display(), "released workspace");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(workspace = %self.root.display(), error = %e, "failed to release workspace");
        }
    }
}

/// Run `f` inside a fresh workspace and release it on every exit path.
///
/// A release failure only surfaces when `f` itself succeeded.
pub fn scoped<T>(
    base: impl AsRef<Path>,
    keep: bool,
    f: impl FnOnce(&Workspace) -> Result<T>,
) -> Result<T> {
    let mut workspace = Workspace::acquire(base, keep)?;
    let result = f(&workspace);
    match (result, workspace.release()) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(cleanup)) => {
            warn!(error = %cleanup, "failed to release workspace after error");
            Err(e)
        }
    }
}

/// Wait until `path` exists and its size is unchanged across two polls.
pub fn await_artifact(path: &Path, timeout: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    let mut last_len: Option<u64> = None;

    loop {
        match fs::metadata(path) {
            Ok(meta) if meta.is_file() => {
                let len = meta.len();
                if last_len == Some(len) {
                    return Ok(());
                }
                last_len = Some(len);
            }
            _ => last_len = None,
        }

        if Instant::now() >= deadline {
            return Err(YangError::Io(std::io::Error::new(
                ErrorKind::TimedOut,
                format!("{} was not produced within {timeout:?}", path.display()),
            )));
        }
        thread::sleep(POLL_INTERVAL);
    }
}
