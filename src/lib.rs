//! # MSGFLOW
//!
//! Message-flow extraction across .NET codebases.
//!
//! For each repository msgflow collects four kinds of facts from source text
//! (and optionally from compiled module dumps), then correlates them into a
//! flow report that flags orphaned and dead-letter events.
//!
//! ## Facts
//!
//! - **Event definitions**: classes deriving from an integration-event base type
//! - **Publish sites**: publisher calls, with the published event traced backward
//! - **Consume sites**: handler-interface implementations
//! - **Subscriptions**: container registrations and event-bus subscriptions
//!
//! ## Output Formats
//!
//! - **JSON**: the full report plus correlation summary
//! - **Markdown**: human-readable flow report
//! - **Cypher**: graph-database script

pub mod bytecode;
pub mod config;
pub mod core;
pub mod error;
pub mod extractors;
pub mod formatters;
