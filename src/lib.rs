//! `bz2fb` - Bugzilla to FogBugz migration engine
//!
//! This crate provides the core functionality for the `bz2fb` CLI tool,
//! which replays a Bugzilla XML export into a FogBugz installation.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Data types (source bugs, target cases, the marker)
//! - [`source`] - Bugzilla XML export reader
//! - [`translate`] - Vocabulary translation tables
//! - [`target`] - FogBugz XML API client and the `CaseStore` seam
//! - [`sanity`] - Pre-flight unmapped-value check
//! - [`convert`] - The two-phase conversion engine
//! - [`config`] - Configuration loading and template generation
//! - [`error`] - Error types and handling
//! - [`logging`] - tracing subscriber setup

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod convert;
pub mod error;
pub mod logging;
pub mod model;
pub mod sanity;
pub mod source;
pub mod target;
pub mod translate;

pub use error::{MigrateError, Result};
