//! Step outputs for the CI runner.
//!
//! The runner exposes a file path in `GITHUB_OUTPUT`; each output is appended
//! as a `name=value` line. Outside the runner the outputs are only logged.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use tracing::{debug, info};

use crate::publish::PublishReport;

pub const OUTPUT_FILE_ENV: &str = "GITHUB_OUTPUT";

const VIEWERS: [&str; 2] = ["https://njump.me/", "https://primal.net/e/"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutputs {
    pub event_id: String,
    pub note_id: String,
}

impl ActionOutputs {
    pub fn from_report(report: &PublishReport) -> Self {
        Self {
            event_id: report.event_id.clone(),
            note_id: report.note_id.clone(),
        }
    }

    pub fn lines(&self) -> String {
        format!("eventId={}\nnoteId={}\n", self.event_id, self.note_id)
    }

    pub fn append_to(&self, path: &Path) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(self.lines().as_bytes())?;
        debug!(path = %path.display(), "Wrote step outputs");
        Ok(())
    }

    /// Write to the path named by `GITHUB_OUTPUT`, if set.
    pub fn write_from_env(&self) -> std::io::Result<bool> {
        match std::env::var_os(OUTPUT_FILE_ENV) {
            Some(path) if !path.is_empty() => {
                self.append_to(Path::new(&path))?;
                Ok(true)
            }
            _ => {
                info!(event_id = %self.event_id, note_id = %self.note_id, "No {} set; outputs not written", OUTPUT_FILE_ENV);
                Ok(false)
            }
        }
    }
}

/// Format `message` as a single runner error annotation line.
pub fn error_annotation(message: &str) -> String {
    let escaped = message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A");
    format!("::error::{escaped}")
}

/// Web links for a published note.
pub fn viewer_links(note_id: &str) -> Vec<String> {
    VIEWERS
        .iter()
        .map(|base| format!("{base}{note_id}"))
        .collect()
}
