//! Shared vocabulary for every stage of the Kiln front end.
//!
//! - [`span`]: byte-offset spans and on-demand line/column lookup
//! - [`token`]: the token vocabulary produced by `kiln-lexer`
//! - [`error`]: lexer errors
//! - [`diagnostic`]: the pieces every structured diagnostic is built from

pub mod diagnostic;
pub mod error;
pub mod span;
pub mod token;
