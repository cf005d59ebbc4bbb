use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use reqwest::{Client, header::CONTENT_LENGTH};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::downloader::progress::ProgressTracker;
use crate::downloader::types::{DownloadDescriptor, ResourceProbe, TrackedResource};
use crate::error::ProbeError;

/// Probes collected before the deadline, keyed by URL, plus the tracked
/// resources built from the successful ones.
#[derive(Debug, Default)]
pub struct ProbeResults {
    pub probes: HashMap<String, ResourceProbe>,
    pub tracked: Vec<TrackedResource>,
}

pub struct Prober {
    client: Client,
    output_dir: PathBuf,
}

impl Prober {
    pub fn new(client: Client, output_dir: PathBuf) -> Self {
        Prober { client, output_dir }
    }

    /// Probes every descriptor concurrently under one shared `timeout`.
    ///
    /// Probes still pending when the deadline fires are left running in the
    /// background and their results are discarded; they simply do not appear in
    /// the returned map. Each successful probe gets a progress bar, and all bars
    /// are registered in `progress` before returning.
    pub async fn probe_all(
        &self,
        descriptors: Vec<DownloadDescriptor>,
        timeout: Duration,
        progress: &ProgressTracker,
    ) -> ProbeResults {
        let mut seen = HashSet::new();
        let descriptors = descriptors
            .into_iter()
            .filter(|d| seen.insert(d.url.clone()))
            .collect::<Vec<_>>();

        let expected = descriptors.len();
        let mut results = ProbeResults::default();
        if expected == 0 {
            return results;
        }

        let (tx, mut rx) = mpsc::channel(expected);
        for descriptor in descriptors {
            let client = self.client.clone();
            let output_dir = self.output_dir.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let probe = probe_one(&client, &output_dir, &descriptor).await;
                // receiver is gone once the deadline fired
                let _ = tx.send(probe).await;
            });
        }
        drop(tx);

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let mut bars = Vec::new();
        while results.probes.len() < expected {
            tokio::select! {
                received = rx.recv() => {
                    let Some(probe) = received else { break };
                    if let Some(size_bytes) = probe.size_bytes() {
                        let bar = progress.create(&probe.target_name, size_bytes);
                        bars.push(bar.clone());
                        results.tracked.push(TrackedResource {
                            url: probe.url.clone(),
                            target_name: probe.target_name.clone(),
                            size_bytes,
                            bar,
                        });
                    }
                    results.probes.insert(probe.url.clone(), probe);
                }
                _ = &mut deadline => {
                    warn!(
                        missing = expected - results.probes.len(),
                        "probe phase timed out after {:?}",
                        timeout
                    );
                    break;
                }
            }
        }

        progress.register_all(&bars);
        info!(
            probed = results.probes.len(),
            tracked = results.tracked.len(),
            "probe phase finished"
        );
        results
    }
}

async fn probe_one(
    client: &Client,
    output_dir: &std::path::Path,
    descriptor: &DownloadDescriptor,
) -> ResourceProbe {
    let target = output_dir.join(&descriptor.target_name);
    debug!(url = %descriptor.url, target = %target.display(), "probing");

    if tokio::fs::try_exists(&target).await.unwrap_or(false) {
        return ResourceProbe::failed(
            descriptor,
            ProbeError::AlreadyExists(descriptor.target_name.clone()),
        );
    }

    let response = match client.head(&descriptor.url).send().await {
        Ok(response) => response,
        Err(err) => {
            warn!(url = %descriptor.url, "probe failed: {}", err);
            return ResourceProbe::failed(
                descriptor,
                ProbeError::Transport {
                    url: descriptor.url.clone(),
                    message: err.to_string(),
                },
            );
        }
    };

    if !response.status().is_success() {
        warn!(url = %descriptor.url, status = %response.status(), "probe rejected");
        return ResourceProbe::failed(
            descriptor,
            ProbeError::HttpStatus {
                status: response.status().to_string(),
            },
        );
    }

    // reqwest reports a zero body size for HEAD, so read the header itself
    let size = response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(0);

    ResourceProbe::sized(descriptor, size)
}
