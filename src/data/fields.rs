//! Per-component views over the flat data map.
//!
//! The backend flattens component data into keys of the form
//! `"<componentName>.<field>"`. These helpers split it back out for display.
//! Everything here is a pure function of the snapshot and is recomputed on
//! every call.

use pipewatch_types::{field_prefix, PipelineComponent, PipelineData, PipelineSnapshot};

/// One field of a component, with the component prefix stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentField {
    pub key: String,
    pub value: String,
}

/// A component together with its fields, ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentView {
    pub component: PipelineComponent,
    pub fields: Vec<ComponentField>,
}

impl ComponentView {
    pub fn name(&self) -> &str {
        &self.component.name
    }
}

/// Fields whose key starts with `"<name>."`, sorted by field key.
///
/// # Example
///
/// ```
/// use pipewatch::data::{component_fields, ComponentField};
/// use pipewatch::PipelineData;
///
/// let mut data = PipelineData::new();
/// data.insert("parser.rows".into(), "10".into());
/// data.insert("joiner.rows".into(), "5".into());
///
/// assert_eq!(
///     component_fields(&data, "parser"),
///     vec![ComponentField { key: "rows".into(), value: "10".into() }]
/// );
/// ```
pub fn component_fields(data: &PipelineData, name: &str) -> Vec<ComponentField> {
    let prefix = field_prefix(name);
    data.iter()
        .filter_map(|(key, value)| {
            key.strip_prefix(prefix.as_str()).map(|field| ComponentField {
                key: field.to_string(),
                value: value.clone(),
            })
        })
        .collect()
}

/// The ordered component list joined with each component's fields.
pub fn component_views(snapshot: &PipelineSnapshot) -> Vec<ComponentView> {
    snapshot
        .ordered_components()
        .into_iter()
        .map(|component| ComponentView {
            fields: component_fields(&snapshot.data, &component.name),
            component: component.clone(),
        })
        .collect()
}

/// Data keys that belong to no listed component.
pub fn unassigned_fields(snapshot: &PipelineSnapshot) -> Vec<(&str, &str)> {
    let prefixes: Vec<String> = snapshot.components.iter().map(|c| c.field_prefix()).collect();
    snapshot
        .data
        .iter()
        .filter(|(key, _)| !prefixes.iter().any(|p| key.starts_with(p.as_str())))
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect()
}
