//! Kanban Board Library
//!
//! This module exports the ordering store, its REST API, and the
//! optimistic board client for testing and integration.

pub mod api;
pub mod board;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod types;
