//! Job progress reporting for the CLI.
//!
//! Every step the pipeline persists to the job record is also handed to a
//! [`JobProgressReporter`], so `brain ingest` can show what is happening.
//! Output goes to **stderr**; stdout carries only the final result.

use std::io::Write;
use std::sync::Arc;

/// One persisted step of a job.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressEvent {
    pub job_id: String,
    pub progress: u8,
    pub message: String,
}

pub trait JobProgressReporter: Send + Sync {
    fn report(&self, event: &ProgressEvent);
}

/// Human-friendly progress on stderr: `ingest 3f2a9c1e  [ 25%] Discovered 4 URLs`.
pub struct StderrProgress;

impl JobProgressReporter for StderrProgress {
    fn report(&self, event: &ProgressEvent) {
        let line = format!(
            "ingest {}  [{:>3}%] {}\n",
            short_id(&event.job_id),
            event.progress,
            event.message
        );
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl JobProgressReporter for JsonProgress {
    fn report(&self, event: &ProgressEvent) {
        let obj = serde_json::json!({
            "event": "progress",
            "job_id": event.job_id,
            "progress": event.progress,
            "message": event.message,
        });
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

pub struct NoProgress;

impl JobProgressReporter for NoProgress {
    fn report(&self, _event: &ProgressEvent) {}
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Arc<dyn JobProgressReporter> {
        match self {
            ProgressMode::Off => Arc::new(NoProgress),
            ProgressMode::Human => Arc::new(StderrProgress),
            ProgressMode::Json => Arc::new(JsonProgress),
        }
    }
}
