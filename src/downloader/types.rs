use std::time::Duration;

use indicatif::ProgressBar;

use crate::error::{ProbeError, TransferError};

/// A resolved (URL, local file name) pair to download.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DownloadDescriptor {
    pub url: String,
    pub target_name: String,
}

impl DownloadDescriptor {
    /// Builds a descriptor whose target name is the last path segment of `url`.
    /// Returns `None` when that segment is empty, `.`/`..`, or contains a
    /// backslash, since it could not be created as a plain file name.
    pub fn from_url(url: &str) -> Option<Self> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let name = path.rsplit('/').next()?;
        if name.is_empty() || !path.contains("://") || path.ends_with("://") {
            return None;
        }
        if name == "." || name == ".." || name.contains('\\') {
            return None;
        }
        Some(DownloadDescriptor {
            url: url.to_string(),
            target_name: name.to_string(),
        })
    }
}

/// Result of the HEAD probe for one descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceProbe {
    pub url: String,
    pub target_name: String,
    pub result: Result<u64, ProbeError>,
}

impl ResourceProbe {
    pub fn sized(descriptor: &DownloadDescriptor, size: u64) -> Self {
        ResourceProbe {
            url: descriptor.url.clone(),
            target_name: descriptor.target_name.clone(),
            result: Ok(size),
        }
    }

    pub fn failed(descriptor: &DownloadDescriptor, err: ProbeError) -> Self {
        ResourceProbe {
            url: descriptor.url.clone(),
            target_name: descriptor.target_name.clone(),
            result: Err(err),
        }
    }

    pub fn size_bytes(&self) -> Option<u64> {
        self.result.as_ref().ok().copied()
    }

    pub fn error(&self) -> Option<&ProbeError> {
        self.result.as_ref().err()
    }
}

/// A successfully probed resource together with its progress bar.
#[derive(Debug)]
pub struct TrackedResource {
    pub url: String,
    pub target_name: String,
    pub size_bytes: u64,
    pub bar: ProgressBar,
}

/// Outcome of one attempted transfer.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub target_name: String,
    pub bytes_written: u64,
    pub elapsed: Duration,
    pub error: Option<TransferError>,
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Everything the orchestrator collected before all transfers finished or the
/// deadline fired.
#[derive(Debug, Clone, Default)]
pub struct RunResult {
    pub outcomes: Vec<TransferOutcome>,
    /// Number of tracked resources handed to the orchestrator.
    pub attempted: usize,
    pub elapsed: Duration,
}

impl RunResult {
    /// True when the deadline fired before every transfer reported back.
    pub fn timed_out(&self) -> bool {
        self.outcomes.len() < self.attempted
    }

    pub fn completed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn total_bytes(&self) -> u64 {
        self.outcomes
            .iter()
            .filter(|o| o.is_success())
            .map(|o| o.bytes_written)
            .sum()
    }

    pub fn outcome(&self, target_name: &str) -> Option<&TransferOutcome> {
        self.outcomes.iter().find(|o| o.target_name == target_name)
    }
}
