pub mod download_handlers;
pub mod health_handlers;
pub mod upload_handlers;
