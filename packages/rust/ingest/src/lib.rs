//! Content ingestion: download markdown blobs into a local staging area and
//! organize them into the layout the external generator expects.

pub mod download;
pub mod organize;

pub use download::{DownloadLimits, download_markdown_files};
pub use organize::organize_content;
