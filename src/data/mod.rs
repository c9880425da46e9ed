//! Data module - CSV loading, validation, filtering and feature encoding

pub mod filter;
mod loader;
mod processor;
mod schema;
mod table;

pub use filter::FilterState;
pub use loader::{DataError, DataLoader, LoaderConfig};
pub use processor::{DataProcessor, FeatureMatrix};
pub use schema::SchemaKind;
pub use table::{is_numeric_dtype, StudentTable};
