//! Shared test utilities for auditsync integration tests.
//!
//! - `TestHarness` for runs against temp-dir config and snapshot files
//! - builders for mailboxes and target policies

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
