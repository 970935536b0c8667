//! Engine tests for pagesync-sync
//!
//! Runs the reconciler and the upload orchestrator against an in-memory
//! content store and checks the resulting remote state, the exact
//! mutations issued and what the tracker was told.

mod common;

mod test_cleanup;
mod test_dry_run;
