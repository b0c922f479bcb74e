//! Orchestrator domain

pub mod services;

pub use services::{Analyzer, PatchError, PatchService};
