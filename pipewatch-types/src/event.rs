//! Partial status updates.

use alloc::string::String;
use alloc::vec::Vec;

use crate::{PipelineComponent, PipelineData, PipelineStatus};

/// A validated, partial update to a [`PipelineSnapshot`](crate::PipelineSnapshot).
///
/// Each field is `Some` only when the inbound frame carried it. Absent fields
/// leave the corresponding snapshot field unchanged when merged.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatusEvent {
    /// New lifecycle status.
    pub status: Option<PipelineStatus>,
    /// Pipeline identifier echoed by the backend.
    pub pipeline_id: Option<String>,
    /// Replacement component list, in arrival order.
    pub components: Option<Vec<PipelineComponent>>,
    /// Replacement data map.
    pub data: Option<PipelineData>,
}

impl StatusEvent {
    /// Create an event that changes nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the status carried by this event.
    pub fn status(mut self, status: PipelineStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the pipeline identifier carried by this event.
    pub fn pipeline_id(mut self, id: impl Into<String>) -> Self {
        self.pipeline_id = Some(id.into());
        self
    }

    /// Set the component list carried by this event.
    pub fn components(mut self, components: Vec<PipelineComponent>) -> Self {
        self.components = Some(components);
        self
    }

    /// Set the data map carried by this event.
    pub fn data(mut self, data: PipelineData) -> Self {
        self.data = Some(data);
        self
    }

    /// True when the event carries no field at all.
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.pipeline_id.is_none()
            && self.components.is_none()
            && self.data.is_none()
    }
}
