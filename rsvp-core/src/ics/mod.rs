//! ICS parsing and generation.
//!
//! This module handles reading and writing calendar documents according to RFC 5545.

mod generate;
mod parse;
pub(crate) mod raw;

pub use generate::generate_ics;
pub use parse::parse_calendar;
