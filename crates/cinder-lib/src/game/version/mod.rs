pub mod document;
pub mod resolver;

pub use document::*;
pub use resolver::*;
