pub mod collector;
pub mod prometheus;

pub use collector::{Protocol, ProtocolBucket, StatRecord};
pub use self::prometheus::StatsExporter;
