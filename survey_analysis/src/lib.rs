//! Tallying of multi-client survey exports.
//!
//! The crate works on a [`SurveyTable`] assembled by the caller (usually from spreadsheet
//! exports, one per client) and provides:
//! - the classification of its columns ([`classify`]),
//! - the normalization and whitelist filtering of the answers ([`normalize`]),
//! - counts and percentages over a filtered subset of the respondents ([`aggregate`]).
//!
//! It does not do any I/O. See the [`manual`] for the configuration and input conventions.

mod config;
mod table;

pub mod aggregate;
pub mod classify;
pub mod manual;
pub mod normalize;

pub use crate::config::*;
pub use crate::table::*;
