//! Vitrine Core - domain types shared by the storefront server and the CLI.
//!
//! The crate holds types and pure logic only: no database access, no HTTP,
//! no clock reads. Anything that persists state does so through a trait the
//! caller implements (see [`CartStorage`]).
//!
//! # Modules
//!
//! - [`types`] - IDs, email addresses, money conversion, statuses, pagination
//!   and the shopping cart store

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
