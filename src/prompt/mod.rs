//! Prompt assembly: system instructions and the bounded conversation window

pub mod history;
pub mod instructions;

pub use history::{TRUNCATION_MARKER, window, window_size};
pub use instructions::{InstructionContext, assemble};
