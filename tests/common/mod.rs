//! Common test infrastructure
//!
//! This module provides everything end-to-end tests need: a throwaway media
//! library on disk and an in-memory stand-in for the remote catalog object.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestLibrary, TV_ALIAS};
//!
//! #[test]
//! fn test_scan() {
//!     let library = TestLibrary::new();
//!     let mut session = library.open_local();
//!     session.refresh().unwrap();
//!     assert!(session.store().len() > 0);
//! }
//! ```

mod constants;
mod fixtures;
mod remote;

// Public API - this is what tests import
#[allow(unused_imports)]
pub use constants::*;
#[allow(unused_imports)]
pub use fixtures::{set_mtime, TestLibrary};
#[allow(unused_imports)]
pub use remote::FakeRemote;
