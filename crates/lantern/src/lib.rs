//! lantern: a server core for many independent full-text search indexes.
//!
//! lantern keeps a directory of Tantivy indexes, each created with its own
//! analyzer configuration. A bounded cache opens indexes on demand, commits
//! them on a schedule and closes them when idle. This crate is the
//! administrative command-line front end over that core.

#![warn(missing_docs)]
