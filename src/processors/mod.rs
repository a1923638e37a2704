//! Data processing modules.

pub mod conversion;
pub mod convective;
pub mod grouping;
pub mod properties;
pub mod reduction;
pub mod replicates;
pub mod sensors;

// Re-export key types for convenience
pub use conversion::{convert_channel, ConversionError, ConvertedChannel};
pub use convective::{build_probe_profile, ProbeColumn, ProbeProfile};
pub use grouping::{eligible_channels, is_channel_excluded, is_group_excluded};
pub use properties::{density, heat_capacity, PropertyError};
pub use reduction::{
    discover_tests, run_batch, BatchReport, PreparedTest, RawTest, ReductionContext,
    ReductionError, TestReport,
};
pub use replicates::{average_replicates, ReplicateError};
pub use sensors::{classify, LineStyle, Quantity, SensorKind};
