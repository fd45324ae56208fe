pub mod dataset_csv;

pub use dataset_csv::{read_dataset_csv, write_dataset_csv};
