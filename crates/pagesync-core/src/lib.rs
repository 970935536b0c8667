//! pagesync Core - Domain model and ports
//!
//! This crate contains the pieces every other pagesync crate agrees on:
//! - **Domain types** - the local `Page` tree, remote page snapshots and
//!   the tagged outcome types produced by a publishing run
//! - **Port definitions** - `ContentClient` (the remote wiki store) and
//!   `UploadTracker` (the outcome sink)
//! - **Configuration** - the YAML configuration file
//!
//! # Architecture
//!
//! Like the rest of the workspace this crate follows a ports & adapters
//! layout. The domain module has no I/O beyond hashing attachment files.
//! Adapter crates (`pagesync-remote`) implement the ports and the engine
//! (`pagesync-sync`) drives them.

pub mod config;
pub mod domain;
pub mod ports;
