//! REST API module.
//!
//! Exposes the ordering store as JSON over HTTP under `/api`.

mod server;

pub use server::{ApiJson, ApiServer, build_router, serve, start_server};
