//! Parsing of CLI output into typed messages

mod parser;

pub use parser::parse_message;
