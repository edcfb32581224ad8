pub mod pagination;
pub mod source;

// Re-exports
pub use pagination::*;
pub use source::*;
