//! Data shapes flowing between the HTTP layer and the pipelines.
//!
//! Everything here is request-scoped: the object store is the only durable
//! owner of bytes and metadata.

pub mod extension;
pub mod object;
pub mod range;
pub mod requests;
