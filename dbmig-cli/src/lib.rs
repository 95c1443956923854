//! dbmig CLI - Command-line interface for the dbmig engine.
//!
//! This crate provides the `dbmig` tool: schema status, init and dump
//! against live MySQL servers, and structure and data migrations.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod prompt;
