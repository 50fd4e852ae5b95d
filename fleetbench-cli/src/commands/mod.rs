//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`cache`] - Working directory maintenance (evict, path)
//! - [`config`] - Configuration management (init, path, show)
//! - [`run`] - Main command (register and play workloads)

pub mod cache;
pub mod config;
pub mod run;
