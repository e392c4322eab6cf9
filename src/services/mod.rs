pub mod download_service;
pub mod error_classifier;
pub mod listing;
pub mod object_key;
pub mod sources;
pub mod upload_service;
