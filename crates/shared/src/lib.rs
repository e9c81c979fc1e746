//! Helpdesk Shared Types and Utilities
//!
//! This crate contains the records, enums and error taxonomy shared by the
//! helpdesk engine and its stores.

#[cfg(feature = "postgres")]
pub mod db;
pub mod error;
pub mod types;

#[cfg(feature = "postgres")]
pub use db::*;
pub use error::*;
pub use types::*;
