mod executor;
mod metadata;
mod planer;
mod progress;
mod prober;
mod report;
mod types;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use reqwest::Client;

pub use executor::{Executor, transfer};
pub use metadata::{MavenMetadata, Versioning};
pub use planer::{Planer, RepositoryConfig, parse_listing};
pub use progress::{ProgressTracker, SuspendWriter, terminal as progress_terminal};
pub use prober::{ProbeResults, Prober};
pub use report::{Report, ReportEntry, Status};
pub use types::{DownloadDescriptor, ResourceProbe, RunResult, TrackedResource, TransferOutcome};

use crate::error::ResolveError;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(20 * 60);

#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Directory target names are created in.
    pub output_dir: PathBuf,
    pub probe_timeout: Duration,
    pub download_timeout: Duration,
    pub show_progress: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            output_dir: PathBuf::from("."),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            show_progress: true,
        }
    }
}

/// Probes, transfers and reports on a set of descriptors.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(client: Client, config: FetchConfig) -> Self {
        Fetcher { client, config }
    }

    pub async fn fetch(&self, descriptors: Vec<DownloadDescriptor>) -> Report {
        let start = Instant::now();
        let progress = if self.config.show_progress {
            ProgressTracker::new()
        } else {
            ProgressTracker::hidden()
        };

        let prober = Prober::new(self.client.clone(), self.config.output_dir.clone());
        let probed = prober
            .probe_all(descriptors.clone(), self.config.probe_timeout, &progress)
            .await;

        let executor = Executor::new(self.client.clone(), self.config.output_dir.clone());
        let run = executor
            .run_all(probed.tracked, self.config.download_timeout, progress)
            .await;

        Report::new(&descriptors, &probed.probes, &run, start.elapsed())
    }
}

/// Resolves the latest artifacts of `repository` and fetches them.
pub async fn download(
    repository: RepositoryConfig,
    config: FetchConfig,
) -> Result<Report, ResolveError> {
    let client = Client::new();
    let planer = Planer::new(client.clone(), repository);
    let descriptors = planer.plan().await?;
    Ok(Fetcher::new(client, config).fetch(descriptors).await)
}
