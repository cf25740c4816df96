//! Data module - CSV loading, cleaning and stratification

mod loader;
mod processor;
pub mod schema;

pub use loader::{DataLoader, LoaderError};
pub use processor::{map_chronic_age, map_nutrition_age, DataProcessor, ProcessorError, StratifiedViews};
