//! Query compilation and result shaping

pub mod compiler;
pub mod dsl;
pub mod shaper;

pub use compiler::compile;
pub use dsl::EngineQuery;
pub use shaper::shape;
