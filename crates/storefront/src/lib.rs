//! Pzafira storefront client library.
//!
//! A client-side state layer over the Pzafira REST backend: entity stores
//! for the cart, wishlist, orders and option lists, a paged catalog view
//! with page-local filtering, local snapshots for offline display and a
//! session boundary that clears per-user state on logout.
//!
//! # Architecture
//!
//! - [`api`] - the [`api::Gateway`] seam and its `reqwest` implementation
//! - [`store`] - entity stores following one hydrate/sync/mutate lifecycle
//! - [`catalog`] - product types, facets, filtering and the paged listing
//! - [`snapshot`] - `redb`-backed key/value snapshots
//! - [`session`] - the logout fan-out
//! - [`notify`] - user-visible notices on a broadcast channel
//! - [`app`] - everything wired together as [`Storefront`]

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod app;
pub mod catalog;
pub mod config;
pub mod error;
pub mod notify;
pub mod session;
pub mod snapshot;
pub mod store;

#[cfg(test)]
mod testing;

pub use app::Storefront;
pub use config::StorefrontConfig;
pub use error::{Result, StoreError};
