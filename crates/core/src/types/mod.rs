//! Core types for Pzafira.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod filter;
pub mod id;
pub mod named;
pub mod page;
pub mod price;
pub mod status;

pub use filter::FilterState;
pub use id::*;
pub use named::NamedRef;
pub use page::Page;
pub use price::{CURRENCY_SYMBOL, OrderTotals, Price, PriceRange};
pub use status::*;
