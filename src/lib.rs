//! # pipewatch
//!
//! A live status client and terminal UI for multi-stage processing pipelines.
//!
//! The backend streams partial status frames over a WebSocket; this crate
//! keeps an authoritative snapshot of the pipeline (lifecycle status,
//! ordered components, flattened per-component data) and keeps the stream
//! alive through timeouts, errors and drops. Queries go over a separate,
//! stateless HTTP channel.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          link                                │
//! │  WebSocket ──▶ codec::decode ──▶ ConnectionMachine ──▶ StateStore
//! │     ▲                               │  (watchdog, reconnect, │
//! │     └───────── handshake ◀──────────┘   generation guard)    │
//! └───────────────────────────────────────────┬──────────────────┘
//!                                             │ watch
//!                       ┌─────────────────────┴─────┐
//!                       ▼                           ▼
//!                 data::fields                   app / ui
//!          (component_fields, views)      (ratatui front end) ──▶ query
//! ```
//!
//! - **[`codec`]**: Frame decoding into [`StatusEvent`]s and the handshake frame
//! - **[`data`]**: The [`StateStore`](data::StateStore), per-component field views, duration helpers
//! - **[`link`]**: The connection state machine and its [`ConnectionManager`] driver
//! - **[`query`]**: The [`QueryGateway`](query::QueryGateway) for the request/response channel
//! - **[`config`]**: Layered [`Settings`](config::Settings)
//! - **[`app`]**, **[`events`]**, **[`ui`]**: The terminal front end
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Watch a pipeline in the TUI
//! pipewatch --url ws://localhost:8765 --pipeline etl-7
//!
//! # Print snapshot changes as lines
//! pipewatch --pipeline etl-7 --headless
//!
//! # Submit one query and print the response
//! pipewatch --api http://localhost:8000 --query "rows processed by ingest"
//! ```
//!
//! ### As a library
//!
//! ```no_run
//! use std::sync::Arc;
//! use pipewatch::{ConnectionManager, LinkOptions, WsConnector};
//! use pipewatch::data::component_views;
//!
//! # tokio_test::block_on(async {
//! let manager = ConnectionManager::spawn(
//!     Arc::new(WsConnector::new()),
//!     LinkOptions::new("ws://localhost:8765", "etl-7"),
//! );
//! let mut snapshot = manager.snapshot();
//! manager.open();
//!
//! while snapshot.changed().await.is_ok() {
//!     for view in component_views(&snapshot.borrow()) {
//!         println!("{}: {} fields", view.name(), view.fields.len());
//!     }
//! }
//! # });
//! ```

pub mod app;
pub mod codec;
pub mod config;
pub mod data;
pub mod error;
pub mod events;
pub mod link;
pub mod query;
pub mod ui;

// Re-export main types for convenience
pub use app::App;
pub use error::{LinkError, QueryError, TransportError};
pub use link::{ConnectionManager, ConnectionState, LinkOptions, LinkStatus, WsConnector};
pub use pipewatch_types::{
    PipelineComponent, PipelineData, PipelineSnapshot, PipelineStatus, StatusEvent,
};
