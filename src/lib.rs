//! nextprayer library - daily prayer table resolution and next-prayer countdown
//!
//! This module exports internal components for integration testing.

pub mod alarms;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod prayer;
pub mod resolver;
pub mod schedule;
pub mod settings;
pub mod table;
