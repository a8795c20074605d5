// Domain layer - Telemetry model and cycle analytics
pub mod aggregates;
pub mod battery;
pub mod metrics;
pub mod options;
pub mod telemetry;
