//! Snapshot - the live, in-memory view of one pipeline.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use crate::{PipelineComponent, PipelineStatus, StatusEvent};

/// Flattened per-component data, keyed by `"<componentName>.<field>"`.
pub type PipelineData = BTreeMap<String, String>;

/// The authoritative view of a pipeline's status, components and data.
///
/// A snapshot starts out [`initialized`](PipelineStatus::Initialized) with no
/// components and no data, and is then changed field by field through
/// [`merge`](Self::merge).
///
/// # Example
///
/// ```rust
/// use pipewatch_types::{PipelineSnapshot, PipelineStatus, StatusEvent};
///
/// let mut snapshot = PipelineSnapshot::new();
/// snapshot.merge(StatusEvent::new().pipeline_id("etl-42"));
/// snapshot.merge(StatusEvent::new().status(PipelineStatus::Paused));
///
/// // The second event did not mention the id, so it is kept.
/// assert_eq!(snapshot.pipeline_id.as_deref(), Some("etl-42"));
/// assert_eq!(snapshot.status, PipelineStatus::Paused);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PipelineSnapshot {
    /// Identifier last reported by the backend, if any.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub pipeline_id: Option<String>,

    /// Current lifecycle status.
    #[cfg_attr(feature = "serde", serde(default))]
    pub status: PipelineStatus,

    /// Components in arrival order. Use [`ordered_components`](Self::ordered_components)
    /// for display order.
    #[cfg_attr(feature = "serde", serde(default))]
    pub components: Vec<PipelineComponent>,

    /// Flattened component data.
    #[cfg_attr(feature = "serde", serde(default))]
    pub data: PipelineData,
}

impl PipelineSnapshot {
    /// Create an empty, initialized snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge the fields present in `event` into this snapshot.
    ///
    /// Returns true if anything changed. Merging the same event twice is a no-op
    /// the second time.
    pub fn merge(&mut self, event: StatusEvent) -> bool {
        let mut changed = false;

        if let Some(status) = event.status {
            changed |= self.status != status;
            self.status = status;
        }
        if let Some(id) = event.pipeline_id {
            if self.pipeline_id.as_deref() != Some(id.as_str()) {
                self.pipeline_id = Some(id);
                changed = true;
            }
        }
        if let Some(components) = event.components {
            if self.components != components {
                self.components = components;
                changed = true;
            }
        }
        if let Some(data) = event.data {
            if self.data != data {
                self.data = data;
                changed = true;
            }
        }

        changed
    }

    /// Restore the initial values.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Components sorted by `order`, ties kept in arrival order.
    ///
    /// Sorting happens on every call; the component list is small.
    pub fn ordered_components(&self) -> Vec<&PipelineComponent> {
        let mut ordered: Vec<&PipelineComponent> = self.components.iter().collect();
        ordered.sort_by_key(|c| c.order);
        ordered
    }

    /// Look up a component by name.
    pub fn component(&self, name: &str) -> Option<&PipelineComponent> {
        self.components.iter().find(|c| c.name == name)
    }

    /// True while nothing beyond the initial values has been received.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Sum of the known component execution times, in seconds.
    pub fn total_execution_time(&self) -> f64 {
        self.components.iter().filter_map(|c| c.execution_time).sum()
    }
}
