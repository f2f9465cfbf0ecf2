//! AWS Lambda binding for the graceful deadline shrinker.
//!
//! This crate owns runtime integration details (event conversion, the service
//! loop, environment configuration). The shrinking decision itself lives in
//! `graceful_core`.

pub mod config;
pub mod runtime;
