//! SQL output module.
//!
//! - [`token`] - Token types for canonical statement rendering

pub mod token;

#[cfg(test)]
pub mod test_utils;

pub use token::{quote_identifier, quote_string, Token, TokenStream};
