//! Verified artifact acquisition and the local artifact cache.

mod cache;
mod download;

pub use cache::{resolve_cache_root, CacheLayout, CacheLocation};
pub use download::{
    AcquisitionEngine, DownloadFailure, DownloadResult, DownloadedArtifact, Verification,
};
