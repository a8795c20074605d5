// Application layer - Use cases over the telemetry repository
pub mod analytics_service;
pub mod battery_service;
pub mod dataset_cache;
pub mod telemetry_repository;
