//! Stream event vocabulary and the grounded-response assembler.

pub mod assembler;
pub mod events;

pub use assembler::{ResponseAssembler, SECTION_MARKER};
pub use events::{ResponseType, StreamEvent};
