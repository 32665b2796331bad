// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod remote_classifier;
pub mod serial_link;
