//! Shared test utilities for Conifer integration tests.
//!
//! This crate provides:
//! - [`TestContext`]: a fully wired control plane over in-memory storage
//! - Factory functions for settings documents, node groups, and tasks
//!
//! # Example
//!
//! ```rust,ignore
//! use conifer_test_utils::{sample_settings, TestContext};
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let ctx = TestContext::new();
//!     ctx.seed_fleet().await;
//!     ctx.settings.set(sample_settings(), "user").await.unwrap();
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
// Test utilities use expect/unwrap for cleaner test code - panics are acceptable in tests
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod fixtures;

pub use fixtures::*;

/// Initialize test logging (call once per test module).
pub fn init_test_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("conifer=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}
