use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures::StreamExt;
use reqwest::Client;
use tokio::{fs::File, io::AsyncWriteExt, sync::mpsc};
use tracing::{debug, info, warn};

use crate::downloader::progress::{self, ProgressTracker};
use crate::downloader::types::{RunResult, TrackedResource, TransferOutcome};
use crate::error::TransferError;

pub struct Executor {
    client: Client,
    output_dir: PathBuf,
}

impl Executor {
    pub fn new(client: Client, output_dir: PathBuf) -> Self {
        Executor { client, output_dir }
    }

    /// Transfers every tracked resource concurrently and collects outcomes
    /// until all have reported or `timeout` elapses, then stops `progress`.
    ///
    /// The deadline only stops the collecting side. Transfers still in flight
    /// keep running in the background and whatever they eventually produce is
    /// discarded.
    pub async fn run_all(
        &self,
        resources: Vec<TrackedResource>,
        timeout: Duration,
        progress: ProgressTracker,
    ) -> RunResult {
        let start = Instant::now();
        let attempted = resources.len();
        let mut result = RunResult {
            attempted,
            ..RunResult::default()
        };

        let (tx, mut rx) = mpsc::channel(attempted.max(1));
        for resource in resources {
            let client = self.client.clone();
            let output_dir = self.output_dir.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let outcome = transfer(&client, &output_dir, resource).await;
                let _ = tx.send(outcome).await;
            });
        }
        drop(tx);

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let mut remaining = attempted;
        while remaining > 0 {
            tokio::select! {
                received = rx.recv() => {
                    let Some(outcome) = received else { break };
                    remaining -= 1;
                    info!(
                        target_name = %outcome.target_name,
                        bytes = outcome.bytes_written,
                        "finished [{}/{}]",
                        attempted - remaining,
                        attempted
                    );
                    result.outcomes.push(outcome);
                }
                _ = &mut deadline => {
                    warn!(missing = remaining, "download phase timed out after {:?}", timeout);
                    break;
                }
            }
        }

        progress.stop();
        result.elapsed = start.elapsed();
        info!(
            completed = result.completed(),
            attempted,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "download phase finished"
        );
        result
    }
}

/// Downloads one resource into `output_dir`, streaming the body to the file
/// and to the resource's progress bar in a single pass.
pub async fn transfer(
    client: &Client,
    output_dir: &Path,
    resource: TrackedResource,
) -> TransferOutcome {
    let start = Instant::now();
    let mut bytes_written = 0;
    let result = fetch_into(client, output_dir, &resource, &mut bytes_written).await;
    let elapsed = start.elapsed();

    match &result {
        Ok(()) => {
            progress::finish(&resource.bar, bytes_written);
            debug!(
                url = %resource.url,
                bytes = bytes_written,
                elapsed_ms = elapsed.as_millis() as u64,
                "saved {}",
                resource.target_name
            );
        }
        Err(err) => {
            resource.bar.abandon_with_message("failed");
            warn!(url = %resource.url, "{}", err);
        }
    }

    TransferOutcome {
        target_name: resource.target_name,
        bytes_written,
        elapsed,
        error: result.err(),
    }
}

async fn fetch_into(
    client: &Client,
    output_dir: &Path,
    resource: &TrackedResource,
    bytes_written: &mut u64,
) -> Result<(), TransferError> {
    let response = client
        .get(&resource.url)
        .send()
        .await
        .map_err(|err| TransferError::Transport {
            url: resource.url.clone(),
            message: err.to_string(),
        })?;

    if !response.status().is_success() {
        return Err(TransferError::HttpStatus {
            status: response.status().to_string(),
        });
    }

    let io_error = |err: &dyn std::fmt::Display| TransferError::Io {
        target: resource.target_name.clone(),
        message: err.to_string(),
    };

    let mut file = File::create(output_dir.join(&resource.target_name))
        .await
        .map_err(|err| io_error(&err))?;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| io_error(&err))?;
        file.write_all(&chunk).await.map_err(|err| io_error(&err))?;
        *bytes_written += chunk.len() as u64;
        progress::advance(&resource.bar, chunk.len() as u64);
    }
    file.flush().await.map_err(|err| io_error(&err))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::prober::Prober;
    use crate::test_support::{MockRepo, content, descriptor};
    use tempfile::TempDir;

    async fn probed(
        repo: &MockRepo,
        dir: &TempDir,
        paths: &[&str],
    ) -> (Vec<TrackedResource>, ProgressTracker) {
        let tracker = ProgressTracker::hidden();
        let descriptors = paths.iter().map(|p| descriptor(&repo.url(p))).collect();
        let results = Prober::new(Client::new(), dir.path().to_path_buf())
            .probe_all(descriptors, Duration::from_secs(5), &tracker)
            .await;
        (results.tracked, tracker)
    }

    fn executor(dir: &TempDir) -> Executor {
        Executor::new(Client::new(), dir.path().to_path_buf())
    }

    #[tokio::test]
    async fn test_run_all_downloads_every_resource() {
        let repo = MockRepo::start().await;
        let dir = TempDir::new().unwrap();
        let (tracked, tracker) =
            probed(&repo, &dir, &["/files/a.jar", "/files/b.jar", "/files/c.jar"]).await;
        let sizes = tracked
            .iter()
            .map(|r| (r.target_name.clone(), r.size_bytes))
            .collect::<Vec<_>>();

        let run = executor(&dir)
            .run_all(tracked, Duration::from_secs(10), tracker)
            .await;

        assert_eq!(run.outcomes.len(), 3);
        assert!(!run.timed_out());
        assert_eq!(run.completed(), 3);
        assert_eq!(run.total_bytes(), 600);
        for (name, size) in sizes {
            let outcome = run.outcome(&name).unwrap();
            assert_eq!(outcome.bytes_written, size);
            let on_disk = std::fs::read(dir.path().join(&name)).unwrap();
            assert_eq!(on_disk.len() as u64, outcome.bytes_written);
            assert_eq!(on_disk, content(size as usize));
        }
    }

    #[tokio::test]
    async fn test_unsized_resource_reports_real_bytes() {
        let repo = MockRepo::start().await;
        let dir = TempDir::new().unwrap();
        let (tracked, tracker) = probed(&repo, &dir, &["/stream/unsized.jar"]).await;
        assert_eq!(tracked[0].size_bytes, 0);
        let bar = tracked[0].bar.clone();

        let run = executor(&dir)
            .run_all(tracked, Duration::from_secs(10), tracker)
            .await;

        let outcome = run.outcome("unsized.jar").unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.bytes_written, 3000);
        let on_disk = std::fs::metadata(dir.path().join("unsized.jar")).unwrap();
        assert_eq!(on_disk.len(), 3000);
        assert!(bar.is_finished());
        assert_eq!(bar.position(), 3000);
    }

    #[tokio::test]
    async fn test_timeout_returns_partial_result() {
        let repo = MockRepo::start().await;
        let dir = TempDir::new().unwrap();
        let (tracked, tracker) =
            probed(&repo, &dir, &["/files/a.jar", "/slowget/late.jar"]).await;
        assert_eq!(tracked.len(), 2);

        let run = executor(&dir)
            .run_all(tracked, Duration::from_millis(1000), tracker)
            .await;

        assert!(run.timed_out());
        assert_eq!(run.outcomes.len(), 1);
        assert!(run.outcome("a.jar").is_some());
        assert!(run.outcome("late.jar").is_none());
        assert!(run.elapsed < crate::test_support::SLOW);
    }

    #[tokio::test]
    async fn test_transfer_status_error() {
        let repo = MockRepo::start().await;
        let dir = TempDir::new().unwrap();
        let tracker = ProgressTracker::hidden();
        let resource = TrackedResource {
            url: repo.url("/files/gone.jar"),
            target_name: "gone.jar".to_string(),
            size_bytes: 10,
            bar: tracker.create("gone.jar", 10),
        };

        let outcome = transfer(&Client::new(), dir.path(), resource).await;

        assert_eq!(outcome.bytes_written, 0);
        match outcome.error {
            Some(TransferError::HttpStatus { status }) => assert!(status.contains("404")),
            other => panic!("expected status error, got {:?}", other),
        }
        assert!(!dir.path().join("gone.jar").exists());
    }

    #[tokio::test]
    async fn test_transfer_io_error() {
        let repo = MockRepo::start().await;
        let dir = TempDir::new().unwrap();
        let tracker = ProgressTracker::hidden();
        let resource = TrackedResource {
            url: repo.url("/files/a.jar"),
            target_name: "a.jar".to_string(),
            size_bytes: 100,
            bar: tracker.create("a.jar", 100),
        };
        let missing_dir = dir.path().join("does-not-exist");

        let outcome = transfer(&Client::new(), &missing_dir, resource).await;

        assert!(matches!(outcome.error, Some(TransferError::Io { .. })));
        assert_eq!(outcome.bytes_written, 0);
    }

    #[tokio::test]
    async fn test_transfer_transport_error() {
        let dir = TempDir::new().unwrap();
        let tracker = ProgressTracker::hidden();
        let resource = TrackedResource {
            url: "http://127.0.0.1:1/x.jar".to_string(),
            target_name: "x.jar".to_string(),
            size_bytes: 1,
            bar: tracker.create("x.jar", 1),
        };

        let outcome = transfer(&Client::new(), dir.path(), resource).await;

        assert!(matches!(outcome.error, Some(TransferError::Transport { .. })));
    }

    #[tokio::test]
    async fn test_run_all_empty() {
        let dir = TempDir::new().unwrap();
        let run = executor(&dir)
            .run_all(Vec::new(), Duration::from_secs(1), ProgressTracker::hidden())
            .await;
        assert_eq!(run.attempted, 0);
        assert!(run.outcomes.is_empty());
        assert!(!run.timed_out());
    }
}
