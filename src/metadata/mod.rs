pub mod error;
pub mod parser;
pub mod types;

pub use error::MetadataError;
pub use parser::MetadataExtractor;
pub use types::*;
