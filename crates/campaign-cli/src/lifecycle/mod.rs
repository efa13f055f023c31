//! Dataset and replica lifecycle: soft deletion and time-series grouping

pub mod delete;
pub mod time_series;

pub use delete::{
    delete_catalog_file, delete_dataset, delete_dataset_if_empty, delete_replica, DatasetSelector,
};
pub use time_series::{add_time_series, remove_time_series, TimeSeriesReport};
