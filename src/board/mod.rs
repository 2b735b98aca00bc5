//! Client-side board core.
//!
//! - [`reorder`]: pure drag-and-drop reorder/move computation.
//! - [`session`]: the optimistic sync coordinator owning local board state.
//! - [`api`]: the persistence seam the session talks to.
//! - [`http`] and [`local`]: persistence adapters over HTTP and in-process.

pub mod api;
pub mod http;
pub mod local;
pub mod reorder;
pub mod session;

pub use api::{BoardApi, TransportError};
pub use http::HttpBoardApi;
pub use reorder::{Container, DragEnd, DragLocation, ItemKind, Reorder, apply_drag};
pub use session::{BoardSession, PendingSync, SessionLimits};
