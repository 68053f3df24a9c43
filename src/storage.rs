//! JSON-lines persistence for trial results.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cogex_core::TrialResult;
use cogex_experiment::{ControllerSnapshot, SessionSummary, TrialSink};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const TRIALS_FILE: &str = "trials.jsonl";
pub const SESSION_FILE: &str = "session.json";

/// Contents of `session.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub experiment: String,
    pub version: String,
    pub seed: u64,
    pub trials_written: usize,
    pub write_failures: usize,
    pub summary: SessionSummary,
    pub controller: ControllerSnapshot,
}

/// Buffered trial store. Trials are appended to `trials.jsonl` as they
/// arrive and flushed every `flush_every` records; a failed write is logged
/// and counted, never surfaced to the session.
pub struct JsonlStore {
    dir: PathBuf,
    writer: BufWriter<File>,
    flush_every: usize,
    unflushed: usize,
    written: usize,
    failures: usize,
    summary: Option<SessionSummary>,
}

impl JsonlStore {
    pub fn open(dir: impl AsRef<Path>, flush_every: usize) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
        let path = dir.join(TRIALS_FILE);
        let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        info!(path = %path.display(), "trial store opened");
        Ok(Self {
            dir,
            writer: BufWriter::new(file),
            flush_every: flush_every.max(1),
            unflushed: 0,
            written: 0,
            failures: 0,
            summary: None,
        })
    }

    fn append(&mut self, result: &TrialResult) -> Result<()> {
        serde_json::to_writer(&mut self.writer, result)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) {
        if let Err(e) = self.writer.flush() {
            self.failures += 1;
            warn!(error = %e, "flushing trial store failed");
        } else {
            debug!(records = self.unflushed, "trial store flushed");
        }
        self.unflushed = 0;
    }

    /// Writes `session.json` next to the trial file.
    pub fn write_session(
        &self,
        seed: u64,
        experiment: (&str, &str),
        controller: ControllerSnapshot,
    ) -> Result<PathBuf> {
        let path = self.dir.join(SESSION_FILE);
        let record = SessionRecord {
            experiment: experiment.0.to_string(),
            version: experiment.1.to_string(),
            seed,
            trials_written: self.written,
            write_failures: self.failures,
            summary: self.summary.clone().unwrap_or_else(|| controller.summary.clone()),
            controller,
        };
        let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &record)
            .with_context(|| format!("writing {}", path.display()))?;
        writer
            .flush()
            .with_context(|| format!("flushing {}", path.display()))?;
        Ok(path)
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl TrialSink for JsonlStore {
    fn submit(&mut self, result: &TrialResult) {
        match self.append(result) {
            Ok(()) => {
                self.written += 1;
                self.unflushed += 1;
            }
            Err(e) => {
                self.failures += 1;
                warn!(trial = result.trial_index, error = %e, "trial not persisted");
            }
        }
        if self.unflushed >= self.flush_every {
            self.flush();
        }
    }

    fn finish(&mut self, summary: &SessionSummary) {
        self.flush();
        self.summary = Some(summary.clone());
        info!(written = self.written, failures = self.failures, "trial store finished");
    }
}
