//! Silencing of solver console output
//!
//! CBC and Gurobi print progress logs straight to the process file descriptors, which
//! would interleave with the reports written by the CLI. The `gag` crate can hold only
//! one redirect per stream at a time, so the redirects are shared through process-wide
//! managers: every solve takes a handle, and the stream is restored when the last
//! handle is dropped.

use gag::Gag;
use std::io;
use std::sync::{Arc, Mutex, Weak};

/// A shared redirect of stdout or stderr to the null device
pub struct GagHandle {
    _gag: Arc<Gag>,
}

impl GagHandle {
    /// Silence stdout until the handle (and every other stdout handle) is dropped
    pub fn stdout() -> io::Result<Self> {
        STDOUT_GAG_MANAGER.acquire()
    }

    /// Silence stderr until the handle (and every other stderr handle) is dropped
    pub fn stderr() -> io::Result<Self> {
        STDERR_GAG_MANAGER.acquire()
    }
}

struct GagManager {
    active: Mutex<Weak<Gag>>,
    create_gag: fn() -> io::Result<Gag>,
}

impl GagManager {
    const fn new(create_gag: fn() -> io::Result<Gag>) -> Self {
        Self {
            active: Mutex::new(Weak::new()),
            create_gag,
        }
    }

    fn acquire(&self) -> io::Result<GagHandle> {
        let mut active = self
            .active
            .lock()
            .map_err(|_| io::Error::other("output suppression lock poisoned"))?;

        if let Some(gag) = active.upgrade() {
            return Ok(GagHandle { _gag: gag });
        }

        let gag = Arc::new((self.create_gag)()?);
        *active = Arc::downgrade(&gag);
        Ok(GagHandle { _gag: gag })
    }
}

static STDOUT_GAG_MANAGER: GagManager = GagManager::new(Gag::stdout);
static STDERR_GAG_MANAGER: GagManager = GagManager::new(Gag::stderr);

/// Silence both stdout and stderr
#[allow(dead_code)]
pub fn suppress_output() -> io::Result<(GagHandle, GagHandle)> {
    Ok((GagHandle::stdout()?, GagHandle::stderr()?))
}
