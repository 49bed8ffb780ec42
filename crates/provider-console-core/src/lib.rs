//! Core types and utilities for provider-console.
//!
//! This crate provides the foundational types shared by every other crate in the
//! workspace:
//!
//! - **Error taxonomy**: [`ErrorKind`], the coarse classification every crate error
//!   maps onto so the boundary can report failures uniformly
//! - **Action results**: [`ActionResult`], the `{success, message|error}` shape
//!   returned by every mutating operation
//! - **Clock**: [`Clock`], the wall-clock source used for freshness checks and
//!   record timestamps
//!
//! # Example
//!
//! ```
//! use provider_console_core::{ActionResult, ErrorKind};
//!
//! let ok = ActionResult::ok("Provider started");
//! assert!(ok.success);
//!
//! let failed = ActionResult::failed(ErrorKind::RuntimeUnavailable, "docker is not reachable");
//! assert!(!failed.success);
//! assert_eq!(failed.kind, Some(ErrorKind::RuntimeUnavailable));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod clock;
pub mod error;
pub mod result;

pub use clock::{Clock, SystemClock};
pub use error::ErrorKind;
pub use result::ActionResult;

#[cfg(any(test, feature = "test-utils"))]
pub use clock::ManualClock;
