//! Artifact export pipeline.

pub mod artifacts;

pub use artifacts::{save_artifacts, ArtifactManager, ArtifactPaths, RunManifest};
