//! Bulk download of the latest published artifacts of a Maven repository
//! group.
//!
//! - [`downloader`] - resolution, probing, parallel transfer and reporting
//! - [`error`] - per-resource and resolution errors

pub mod downloader;
pub mod error;
pub mod utils;

#[cfg(test)]
mod test_support;
