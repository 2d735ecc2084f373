//! Shared utilities for the chitter workspace.
//!
//! Currently this is just the centralised `tracing` initialisation; the
//! crate is kept dependency-light so every member can pull it in.

pub mod observability;
