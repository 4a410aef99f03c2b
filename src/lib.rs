// ABOUTME: Library root for intent-tracker — re-exports all modules for integration testing.
// ABOUTME: The binary entry point is in main.rs, which uses this crate as a library.

pub mod commands;
pub mod config;
pub mod git;
pub mod hook;
pub mod oracle;
pub mod report;
pub mod session;
pub mod tracker;
