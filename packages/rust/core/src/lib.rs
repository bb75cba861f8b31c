//! Core workflows and page state for SchemaConsole.
//!
//! This crate ties the backend client and the session store together into
//! the console's pages: connect, metadata, mapping, KG chat and NL2SQL.
//! The CLI and the TUI are thin front-ends over these modules.

pub mod chat;
pub mod connect;
pub mod mapping;
pub mod metadata;
pub mod navigation;
pub mod nl2sql;
pub mod session;

#[cfg(test)]
pub(crate) mod testutil;
