//! Web dashboard for OpAMP-managed agents: browse the agents an OpAMP server
//! knows about, inspect their status and attributes, and edit their
//! effective YAML configuration.

pub mod agents;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod document;
pub mod logging;
pub mod sessions;
