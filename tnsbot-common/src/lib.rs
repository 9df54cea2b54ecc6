//! # tnsbot common library
//!
//! Shared code for the transient reporting bot:
//! - Error taxonomy and result alias
//! - Credential and settings loading
//! - Survey/registry domain models
//! - Julian date and ISO-8601 conversions

pub mod config;
pub mod error;
pub mod models;
pub mod time;

pub use error::{Error, Result};
