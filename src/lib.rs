pub mod collate;
pub mod constants;
pub mod dataset;
pub mod loader;
pub mod params;
pub mod records;
pub mod trajwin_errors;
pub mod windows;

pub use collate::{collate, Batch};
pub use dataset::{SequenceDataset, SequenceItem};
pub use loader::DataLoader;
pub use params::DatasetParams;
pub use trajwin_errors::TrajwinError;
