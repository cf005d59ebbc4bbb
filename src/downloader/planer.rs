use std::sync::LazyLock;

use futures::{StreamExt, stream};
use regex::Regex;
use reqwest::Client;
use tracing::{info, warn};

use crate::downloader::metadata::MavenMetadata;
use crate::downloader::types::DownloadDescriptor;
use crate::error::ResolveError;
use crate::utils::multierr::MultiError;

const METADATA_CONCURRENCY: usize = 8;

static ANCHOR_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<a\b[^>]*>(.*?)</a>").unwrap());

/// Where a group of artifacts lives and which of them to fetch.
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    /// Host with scheme, e.g. `https://repo1.maven.org`.
    pub server_url: String,
    /// Repository, proxy or group path below the host, e.g. `maven2`.
    pub repository_path: String,
    /// Dotted group id, e.g. `org.springframework.cloud`.
    pub group_id: String,
    /// Appended to `{artifactId}-{version}`, e.g. `.jar` or `-exec.jar`.
    pub extension: String,
    /// Only artifact ids matching this are fetched.
    pub filter: Option<Regex>,
}

impl RepositoryConfig {
    pub fn new(server_url: &str, repository_path: &str, group_id: &str) -> Self {
        RepositoryConfig {
            server_url: server_url.to_string(),
            repository_path: repository_path.to_string(),
            group_id: group_id.to_string(),
            extension: ".jar".to_string(),
            filter: None,
        }
    }

    pub fn group_url(&self) -> String {
        let mut parts = vec![self.server_url.trim_end_matches('/').to_string()];
        let repository = self.repository_path.trim_matches('/');
        if !repository.is_empty() {
            parts.push(repository.to_string());
        }
        parts.push(self.group_id.trim_matches('.').replace('.', "/"));
        parts.join("/")
    }

    pub fn artifact_url(&self, artifact_id: &str) -> String {
        format!("{}/{}", self.group_url(), artifact_id)
    }

    pub fn metadata_url(&self, artifact_id: &str) -> String {
        format!("{}/maven-metadata.xml", self.artifact_url(artifact_id))
    }

    pub fn artifact_file_url(&self, artifact_id: &str, version: &str) -> String {
        format!(
            "{}/{}/{}-{}{}",
            self.artifact_url(artifact_id),
            version,
            artifact_id,
            version,
            self.extension
        )
    }

    fn accepts(&self, artifact_id: &str) -> bool {
        self.filter
            .as_ref()
            .is_none_or(|filter| filter.is_match(artifact_id))
    }
}

/// Artifact ids named by a repository directory listing. Only link texts that
/// end in `/` and contain no spaces count. Ids with a path separator or a
/// leading `.` (including `../`) are ignored.
pub fn parse_listing(html: &str) -> Vec<String> {
    let mut ids = ANCHOR_TEXT
        .captures_iter(html)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|text| !text.contains(char::is_whitespace) && text.ends_with('/'))
        .map(|text| text.trim_end_matches('/'))
        .filter(|id| is_plain_segment(id))
        .map(String::from)
        .collect::<Vec<_>>();
    ids.sort();
    ids.dedup();
    ids
}

/// A single non-hidden path segment: no separators, no leading `.`.
fn is_plain_segment(text: &str) -> bool {
    !text.is_empty() && !text.starts_with('.') && !text.contains(['/', '\\'])
}

/// Resolves the latest published file of every artifact under a group.
pub struct Planer {
    client: Client,
    repository: RepositoryConfig,
}

impl Planer {
    pub fn new(client: Client, repository: RepositoryConfig) -> Self {
        Planer { client, repository }
    }

    pub fn repository(&self) -> &RepositoryConfig {
        &self.repository
    }

    async fn get_text(&self, url: &str) -> Result<String, ResolveError> {
        let transport = |source| ResolveError::Transport {
            url: url.to_string(),
            source,
        };
        let response = self.client.get(url).send().await.map_err(transport)?;
        if !response.status().is_success() {
            return Err(ResolveError::HttpStatus {
                url: url.to_string(),
                status: response.status().to_string(),
            });
        }
        response.text().await.map_err(transport)
    }

    /// Artifact ids listed under the group, after the filter.
    pub async fn list_artifacts(&self) -> Result<Vec<String>, ResolveError> {
        let url = format!("{}/", self.repository.group_url());
        info!(url = %url, "loading artifact list");
        let html = self.get_text(&url).await?;
        Ok(parse_listing(&html)
            .into_iter()
            .filter(|id| self.repository.accepts(id))
            .collect())
    }

    pub async fn fetch_metadata(&self, artifact_id: &str) -> Result<MavenMetadata, ResolveError> {
        let document = self
            .get_text(&self.repository.metadata_url(artifact_id))
            .await?;
        MavenMetadata::parse(&document).map_err(|source| ResolveError::Metadata {
            artifact_id: artifact_id.to_string(),
            source,
        })
    }

    async fn resolve(&self, artifact_id: &str) -> Result<DownloadDescriptor, ResolveError> {
        let metadata = self.fetch_metadata(artifact_id).await?;
        let version = metadata
            .latest_version()
            .ok_or_else(|| ResolveError::NoVersion(artifact_id.to_string()))?;
        if !is_plain_segment(version) {
            return Err(ResolveError::UnsafeName(format!(
                "{} version {}",
                artifact_id, version
            )));
        }
        let url = self.repository.artifact_file_url(artifact_id, version);
        DownloadDescriptor::from_url(&url).ok_or(ResolveError::UnsafeName(url))
    }

    /// One descriptor per listed artifact that has a latest version. Artifacts
    /// that fail to resolve are logged and skipped.
    pub async fn plan(&self) -> Result<Vec<DownloadDescriptor>, ResolveError> {
        let artifact_ids = self.list_artifacts().await?;

        let resolved = stream::iter(artifact_ids.iter())
            .map(|id| async move { (id, self.resolve(id).await) })
            .buffer_unordered(METADATA_CONCURRENCY)
            .collect::<Vec<_>>()
            .await;

        let mut descriptors = Vec::new();
        let mut errs = Vec::new();
        for (id, result) in resolved {
            match result {
                Ok(descriptor) => descriptors.push(descriptor),
                Err(err) => {
                    warn!(artifact_id = %id, "skipping artifact: {}", err);
                    errs.push(err);
                }
            }
        }

        if descriptors.is_empty() {
            return if errs.is_empty() {
                Err(ResolveError::NoArtifacts(self.repository.group_url()))
            } else {
                Err(ResolveError::AllFailed(MultiError::new(errs)))
            };
        }

        descriptors.sort_by(|a, b| a.target_name.cmp(&b.target_name));
        info!(count = descriptors.len(), "resolved artifacts");
        Ok(descriptors)
    }
}
