//! Scenecheck CLI
//!
//! Command-line interface for running scene verification scenarios and
//! checking sprite-sheet manifests.

pub mod commands;
pub mod output;
