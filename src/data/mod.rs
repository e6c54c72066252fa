//! Snapshot storage and derived views.
//!
//! ## Submodules
//!
//! - [`store`]: The authoritative snapshot ([`StateStore`]), published over a watch channel
//! - [`fields`]: Per-component field views derived from the flat data map
//! - [`duration`]: Parsing and formatting of durations (e.g., "5s", "500ms")
//!
//! ## Data Flow
//!
//! ```text
//! StatusEvent (decoded frame)
//!        │
//!        ▼
//! StateStore::apply_event()
//!        │
//!        ├──▶ watch::Receiver<PipelineSnapshot> (presentation)
//!        │
//!        └──▶ component_views() / component_fields() (derived per read)
//! ```

pub mod duration;
pub mod fields;
pub mod store;

pub use fields::{component_fields, component_views, unassigned_fields, ComponentField, ComponentView};
pub use store::StateStore;
