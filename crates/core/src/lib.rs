//! Fieldboard dashboard layout engine: pure domain logic, no I/O.
//!
//! - [`grid`] / [`packing`]: canonical grid cells and minimised-card packing.
//! - [`card`] / [`group`] / [`layout`]: the card and group stores and the
//!   validated operations that span both.
//! - [`drag`] / [`coalesce`] / [`autoscroll`]: pointer-driven interaction
//!   controllers.
//! - [`history`]: append-only layout versions with undo/redo and publish.
//! - [`acl`]: region access control policy.
//! - [`mutation`] / [`queue`]: replay-safe mutations and the offline queue
//!   state machine.

pub mod acl;
pub mod autoscroll;
pub mod card;
pub mod coalesce;
pub mod drag;
pub mod error;
pub mod grid;
pub mod group;
pub mod history;
pub mod layout;
pub mod mutation;
pub mod packing;
pub mod prefs;
pub mod queue;
pub mod types;
pub mod versioned;

pub use error::CoreError;
