//! # Arbor Bin - Server Support
//!
//! Startup support for the `arbordb` binary: system initialization shared
//! with the integration tests.

pub mod initialization;
