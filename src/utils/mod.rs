//! Utility functions.
//!
//! Collection of helpers used across the plugins.

pub mod entities;
pub mod export;
pub mod keyboards;
pub mod parser;

pub use entities::entities_to_html;
pub use parser::{format_average, html_escape, parse_bonus_args, parse_page};
