//! Ingest progress reporting.
//!
//! Reports observable progress during `quack ingest` so users see how many
//! files have been segmented and how many fragments are written. Progress is
//! emitted on **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event for ingestion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngestProgressEvent {
    /// Walking the source tree. Total unknown.
    Scanning { project: String },
    /// `n` of `total` files read and segmented.
    Segmenting { project: String, n: u64, total: u64 },
    /// `n` of `total` fragments written to the store.
    Writing { project: String, n: u64, total: u64 },
}

/// Reports ingest progress. Implementations write to stderr (human or JSON).
pub trait IngestProgressReporter: Send + Sync {
    fn report(&self, event: IngestProgressEvent);
}

/// Human-friendly progress on stderr: "ingest demo  segmenting  12 / 40 files".
pub struct StderrProgress;

impl IngestProgressReporter for StderrProgress {
    fn report(&self, event: IngestProgressEvent) {
        let line = match &event {
            IngestProgressEvent::Scanning { project } => {
                format!("ingest {}  scanning...\n", project)
            }
            IngestProgressEvent::Segmenting { project, n, total } => format!(
                "ingest {}  segmenting  {} / {} files\n",
                project,
                format_number(*n),
                format_number(*total)
            ),
            IngestProgressEvent::Writing { project, n, total } => format!(
                "ingest {}  writing  {} / {} fragments\n",
                project,
                format_number(*n),
                format_number(*total)
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IngestProgressReporter for JsonProgress {
    fn report(&self, event: IngestProgressEvent) {
        let obj = match &event {
            IngestProgressEvent::Scanning { project } => serde_json::json!({
                "event": "progress",
                "project": project,
                "phase": "scanning"
            }),
            IngestProgressEvent::Segmenting { project, n, total } => serde_json::json!({
                "event": "progress",
                "project": project,
                "phase": "segmenting",
                "n": n,
                "total": total
            }),
            IngestProgressEvent::Writing { project, n, total } => serde_json::json!({
                "event": "progress",
                "project": project,
                "phase": "writing",
                "n": n,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IngestProgressReporter for NoProgress {
    fn report(&self, _event: IngestProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn IngestProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
