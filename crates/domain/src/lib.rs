//! Shared types for the EMDR remote server: error type, configuration tree
//! and structured trace events.

pub mod config;
pub mod error;
pub mod trace;
