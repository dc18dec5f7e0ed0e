//! Partmaster: part master-data store
//!
//! Brings a SQLite store to the current schema, imports an export directory
//! of part descriptors and images into it, and keeps part images in a
//! content-addressed blob store.

pub mod cli;
pub mod core;
