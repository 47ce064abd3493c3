// SPDX-License-Identifier: MPL-2.0

//! Locating the external ffmpeg binary and building invocations
//!
//! Every capture, probe and encode operation in this crate shells out to
//! ffmpeg. The binary is resolved once per [`FfmpegCommand`] value and the
//! value is passed explicitly to whatever needs it, so tests can substitute
//! a fake binary without touching process environment.

use std::collections::VecDeque;
use std::env;
use std::ffi::OsString;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::errors::{AppError, AppResult};

/// Environment variable overriding the binary location
const FFMPEG_PATH_VAR: &str = "FFMPEG_PATH";

/// Binary names probed for, in preference order
const BINARY_NAMES: [&str; 2] = ["ffmpeg.exe", "ffmpeg"];

/// Stderr lines retained for error reporting
const STDERR_TAIL_LINES: usize = 8;

/// Handle to a resolved ffmpeg binary
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    binary: PathBuf,
}

impl FfmpegCommand {
    /// Resolve the binary from the process environment
    ///
    /// Order: `FFMPEG_PATH` (must point at an existing file), then a PATH
    /// scan for each known binary name, then a sibling of the current
    /// executable.
    pub fn locate() -> AppResult<Self> {
        let resolved = resolve_from(env::var_os(FFMPEG_PATH_VAR), env::var_os("PATH"))
            .or_else(exe_sibling)
            .ok_or_else(|| {
                AppError::Other(format!(
                    "ffmpeg binary not found; install ffmpeg or set {}",
                    FFMPEG_PATH_VAR
                ))
            })?;

        debug!(binary = %resolved.display(), "Resolved ffmpeg binary");
        Ok(Self { binary: resolved })
    }

    /// Use a specific binary path without any lookup
    pub fn from_path(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Path of the resolved binary
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Fresh command for the resolved binary; callers append their args
    pub fn command(&self) -> Command {
        Command::new(&self.binary)
    }
}

/// Resolution against explicit environment values, PATH-scan included
fn resolve_from(override_var: Option<OsString>, path_var: Option<OsString>) -> Option<PathBuf> {
    if let Some(raw) = override_var {
        let candidate = PathBuf::from(raw);
        if candidate.is_file() {
            return Some(candidate);
        }
        debug!(candidate = %candidate.display(), "FFMPEG_PATH does not exist, ignoring");
    }

    let path_var = path_var?;
    for name in BINARY_NAMES {
        for dir in env::split_paths(&path_var) {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }

    None
}

/// Handle on a child's drained stderr
///
/// The drain thread keeps the last few lines so a failed open or close
/// can report the tool's own error text instead of a bare exit status.
pub struct StderrLogger {
    tail: Arc<Mutex<VecDeque<String>>>,
    thread: Option<JoinHandle<()>>,
}

impl StderrLogger {
    /// The retained stderr lines, oldest first; empty when the tool said nothing
    pub fn tail(&self) -> String {
        let tail = self.tail.lock().unwrap_or_else(|e| e.into_inner());
        tail.iter().cloned().collect::<Vec<_>>().join("; ")
    }

    /// Wait for the drain thread; returns once the child has closed its stderr
    pub fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Drain a child's stderr on a background thread, forwarding to the log
///
/// The tool reports diagnostics on stderr; leaving the pipe undrained
/// would eventually block the child. Callers invoke the tool with
/// `-loglevel warning`, so every drained line is a warning or worse.
/// Returns `None` when stderr was not piped.
pub fn spawn_stderr_logger(child: &mut Child, context: &'static str) -> Option<StderrLogger> {
    let stderr = child.stderr.take()?;
    let tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
    let sink = Arc::clone(&tail);
    let thread = thread::spawn(move || {
        for line in BufReader::new(stderr).lines() {
            match line {
                Ok(content) if !content.trim().is_empty() => {
                    let content = content.trim();
                    warn!(context, "ffmpeg: {}", content);
                    let mut tail = sink.lock().unwrap_or_else(|e| e.into_inner());
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(content.to_string());
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
    });
    Some(StderrLogger {
        tail,
        thread: Some(thread),
    })
}

/// Binary shipped next to the application executable
fn exe_sibling() -> Option<PathBuf> {
    let exe = env::current_exe().ok()?;
    let dir = exe.parent()?;
    BINARY_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}
