//! HTTP clients for the layout persistence and region ACL APIs.
//!
//! - [`LayoutBackend`] / [`AclBackend`]: the async seams the sync layer
//!   depends on.
//! - [`LayoutApiClient`]: the `reqwest` implementation of both.

pub mod api;
pub mod backend;
pub mod error;

pub use api::LayoutApiClient;
pub use backend::{AclBackend, LayoutBackend, PublishedVersion};
pub use error::ClientError;
