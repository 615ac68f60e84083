//! Utility functions.

pub mod parser;

pub use parser::{CommandInvocation, html_escape, parse_command};
