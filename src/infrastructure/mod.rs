// Infrastructure layer - External dependencies and adapters
pub mod battery_api_repository;
pub mod config;
pub mod http_response;
pub mod record_mapper;
pub mod view_mapper;
