//! CLI command implementations.
//!
//! # Command Modules
//!
//! - [`demo`] - Concurrency harness with simulated backends
//! - [`fetch`] - Fetch and parse real web pages

pub mod demo;
pub mod fetch;
