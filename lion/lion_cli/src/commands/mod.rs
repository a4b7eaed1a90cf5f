//! Subcommand implementations.

pub mod config;
pub mod exercise;
pub mod serve;
