//! Orchestration of the SitePress publish pipeline.
//!
//! [`pipeline::publish_site`] sequences download → organize → build →
//! backup → deploy, with conditional rollback, and aggregates every stage's
//! errors into one [`sitepress_shared::PublishResult`].

pub mod pipeline;

pub use pipeline::{ProgressReporter, SilentProgress, publish_site};
