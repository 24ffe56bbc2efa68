//! Models module

pub mod document;
pub mod search;

pub use document::*;
pub use search::*;
