//! Detection pipeline
//!
//! Signature → prediction backend → normalization → persistence → archive.

pub mod entropy;
pub mod fingerprint;
pub mod prediction;
pub mod normalize;
pub mod archive;
pub mod orchestrator;

pub use orchestrator::{Orchestrator, ProcessedUpload};
