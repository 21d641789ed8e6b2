// Common module - leaf components shared by the dispatcher

pub mod access_policy;
pub mod stats;

pub use access_policy::OriginPolicy;
pub use stats::{StatsRegistry, StatsSnapshot};
