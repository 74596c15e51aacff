//! Volunteer roster assignment.
//!
//! This crate primarily ships the `assigner` binary, but exposes its engine
//! and stores as a library for integration testing and reuse.

pub mod allocation;
pub mod config;
pub mod db;
