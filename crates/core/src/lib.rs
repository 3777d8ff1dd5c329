//! Pzafira Core - Shared types library.
//!
//! This crate provides the domain types used across all Pzafira components:
//! - `storefront` - Client-side state layer (stores, catalog view, session)
//! - `cli` - Command-line front end
//!
//! # Architecture
//!
//! The core crate contains only types and pure helpers - no I/O, no HTTP
//! clients, no persistence. This keeps it lightweight and allows it to be
//! used anywhere, including the fake backend in the integration tests.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, statuses, prices, name references, pages and filters

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
