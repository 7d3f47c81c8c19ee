pub mod input;
pub mod table;

// Re-export common types
pub use input::{FileIdentifierSource, IdentifierSource};
pub use table::{FileTableWriter, TableWriter};
