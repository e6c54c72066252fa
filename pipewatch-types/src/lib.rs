//! # pipewatch-types
//!
//! Core types for live pipeline status. This crate defines the snapshot model
//! that a status-emitting pipeline backend streams to pipewatch: the lifecycle
//! status, the ordered component list and the flattened per-component data map.
//!
//! ## Design Goals
//!
//! - **Zero required dependencies**: Core types work without any serialization framework
//! - **Optional serialization**: Enable the `serde` feature to (de)serialize snapshots
//! - **Partial updates**: [`StatusEvent`] carries only the fields a frame mentioned,
//!   and [`PipelineSnapshot::merge`] leaves every other field untouched
//!
//! ## Features
//!
//! - `std` (default): Standard library support
//! - `serde`: JSON/etc. serialization via serde
//!
//! ## Example
//!
//! ```rust
//! use pipewatch_types::{PipelineComponent, PipelineSnapshot, PipelineStatus, StatusEvent};
//!
//! let mut snapshot = PipelineSnapshot::new();
//!
//! let event = StatusEvent::new()
//!     .status(PipelineStatus::Running)
//!     .components(vec![
//!         PipelineComponent::new("join", 2),
//!         PipelineComponent::new("ingest", 1),
//!     ]);
//! assert!(snapshot.merge(event));
//!
//! let names: Vec<&str> = snapshot
//!     .ordered_components()
//!     .iter()
//!     .map(|c| c.name.as_str())
//!     .collect();
//! assert_eq!(names, ["ingest", "join"]);
//! assert_eq!(snapshot.status, PipelineStatus::Running);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod component;
mod event;
mod snapshot;
mod status;

pub use component::*;
pub use event::*;
pub use snapshot::*;
pub use status::*;
