use thiserror::Error;

use crate::utils::multierr::MultiError;

/// Why a descriptor was not eligible for transfer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// A local file with the target name is already present. This is a skip,
    /// not a failure.
    #[error("file {0} already exists")]
    AlreadyExists(String),

    #[error("error while probing {url}: {message}")]
    Transport { url: String, message: String },

    #[error("server returned non-success status: {status}")]
    HttpStatus { status: String },
}

impl ProbeError {
    pub fn is_skip(&self) -> bool {
        matches!(self, ProbeError::AlreadyExists(_))
    }
}

/// Why an attempted transfer did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("error while downloading {url}: {message}")]
    Transport { url: String, message: String },

    #[error("server returned non-success status: {status}")]
    HttpStatus { status: String },

    #[error("failed saving file {target}: {message}")]
    Io { target: String, message: String },
}

/// Malformed `maven-metadata.xml`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    #[error("metadata document has no <{0}> element")]
    MissingElement(&'static str),
}

/// Failure to turn repository coordinates into download descriptors.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned {status}")]
    HttpStatus { url: String, status: String },

    #[error("invalid metadata for {artifact_id}: {source}")]
    Metadata {
        artifact_id: String,
        #[source]
        source: MetadataError,
    },

    #[error("artifact {0} has no published version")]
    NoVersion(String),

    #[error("refusing to save {0}: not a plain file name")]
    UnsafeName(String),

    #[error("no artifacts found under {0}")]
    NoArtifacts(String),

    #[error("{0}")]
    AllFailed(MultiError<ResolveError>),
}
