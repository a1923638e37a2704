//! Core data types and I/O operations.

pub mod loaders;
pub mod transforms;
pub mod writers;

pub use loaders::{
    AxisScale, CalibrationRecord, CalibrationTable, Column, DataTable, DescriptionTable,
    EventTable, LoaderError, TestDescriptor, TimelineEvent,
};
pub use writers::{write_table_csv, WriteError};
