// ── Raw device output transcript ──

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::warn;

/// Append-only log of raw device output, for operators only.
///
/// Write failures are logged and otherwise ignored; nothing in the
/// engine depends on the transcript.
#[derive(Debug, Default)]
pub struct Transcript {
    path: Option<PathBuf>,
    lock: Mutex<()>,
}

impl Transcript {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn record(&self, heading: &str, output: &str) {
        let Some(path) = &self.path else {
            return;
        };
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let stamp = chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, false);
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| writeln!(file, "--- {heading} @ {stamp} ---\n{output}\n"));
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "cannot append to transcript");
        }
    }
}
