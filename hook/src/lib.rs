//! robotpy-fetch build hook library.
//!
//! This crate downloads zip artefacts from direct URLs or Maven
//! repositories, caches them on disk, and extracts headers and libraries
//! into the build tree of a wheel. It is used by the `robotpy-fetch-hook`
//! runner binary and can be driven programmatically through the
//! [`hook::BuildHook`] trait.
//!
//! # Modules
//!
//! - [`artefact`] - Download, verification, and zip extraction primitives
//! - [`build_data`] - The host's per-build record
//! - [`cache`] - Content-addressed download cache
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - Hook configuration parsing and validation
//! - [`error`] - Hook error types
//! - [`fetch`] - Cache-first artefact fetching
//! - [`hook`] - Build lifecycle orchestration
//! - [`maven`] - Maven coordinates and repository layout
//! - [`output`] - User-facing progress output
//! - [`resolve`] - Per-platform target resolution
//! - [`strip`] - Debug symbol stripping

pub mod artefact;
pub mod build_data;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod hook;
pub mod maven;
pub mod output;
pub mod resolve;
pub mod strip;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
