use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use indicatif::HumanBytes;

use crate::downloader::types::{DownloadDescriptor, ResourceProbe, RunResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Succeeded { bytes: u64, elapsed: Duration },
    /// The target file was already present.
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub target_name: String,
    pub url: String,
    pub status: Status,
}

/// Per-descriptor outcome of a whole run plus the batch summary.
#[derive(Debug, Clone)]
pub struct Report {
    pub entries: Vec<ReportEntry>,
    /// Resources that passed probing and were handed to the orchestrator.
    pub attempted: usize,
    pub completed: usize,
    pub total_bytes: u64,
    pub elapsed: Duration,
}

impl Report {
    pub fn new(
        descriptors: &[DownloadDescriptor],
        probes: &HashMap<String, ResourceProbe>,
        run: &RunResult,
        elapsed: Duration,
    ) -> Self {
        let mut entries = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            if entries
                .iter()
                .any(|e: &ReportEntry| e.url == descriptor.url)
            {
                continue;
            }
            let status = match probes.get(&descriptor.url).map(|p| &p.result) {
                None => Status::Failed("probe timed out".to_string()),
                Some(Err(err)) if err.is_skip() => Status::Skipped,
                Some(Err(err)) => Status::Failed(err.to_string()),
                Some(Ok(_)) => match run.outcome(&descriptor.target_name) {
                    None => Status::Failed("download timed out".to_string()),
                    Some(outcome) => match &outcome.error {
                        Some(err) => Status::Failed(err.to_string()),
                        None => Status::Succeeded {
                            bytes: outcome.bytes_written,
                            elapsed: outcome.elapsed,
                        },
                    },
                },
            };
            entries.push(ReportEntry {
                target_name: descriptor.target_name.clone(),
                url: descriptor.url.clone(),
                status,
            });
        }
        entries.sort_by(|a, b| a.target_name.cmp(&b.target_name));

        Report {
            entries,
            attempted: run.attempted,
            completed: run.completed(),
            total_bytes: run.total_bytes(),
            elapsed,
        }
    }

    pub fn entry(&self, target_name: &str) -> Option<&ReportEntry> {
        self.entries.iter().find(|e| e.target_name == target_name)
    }

    pub fn count(&self, pred: impl Fn(&Status) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.status)).count()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Succeeded { bytes, elapsed } => write!(
                f,
                "downloaded {} bytes ({}) in {:.2}s",
                bytes,
                HumanBytes(*bytes),
                elapsed.as_secs_f64()
            ),
            Status::Skipped => write!(f, "skipped, already exists"),
            Status::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{}: {}", entry.target_name, entry.status)?;
        }
        write!(
            f,
            "{} of {} downloads completed, {} skipped, {} failed, {} in {:.2}s",
            self.completed,
            self.attempted,
            self.count(|s| matches!(s, Status::Skipped)),
            self.count(|s| matches!(s, Status::Failed(_))),
            HumanBytes(self.total_bytes),
            self.elapsed.as_secs_f64()
        )
    }
}
