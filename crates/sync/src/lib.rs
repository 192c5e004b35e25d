//! Offline-first persistence for dashboard layouts.
//!
//! - [`manager`] -- the offline queue driven against the layout API
//! - [`session`] -- one open layout: edits, undo/redo, publishing
//! - [`publish`] -- confirm-then-apply version publishing
//! - [`acl`] -- region ACL reads and gated writes
//! - [`connectivity`] -- online/offline signal and health probing
//! - [`store`] -- local JSON documents under fixed keys
//! - [`debounce`] -- trailing-edge debounce for grid packing
//! - [`events`] -- broadcast bus for sync status updates

pub mod acl;
pub mod config;
pub mod connectivity;
pub mod debounce;
pub mod error;
pub mod events;
pub mod manager;
pub mod publish;
pub mod session;
pub mod store;

pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use manager::SyncManager;
pub use session::LayoutSession;
