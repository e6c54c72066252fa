//! Pipeline components.

use alloc::string::String;

/// One stage of a pipeline.
///
/// Components are displayed and executed in ascending `order`; components that
/// share an order keep the sequence in which the backend listed them.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PipelineComponent {
    /// Component name, unique within a pipeline.
    pub name: String,

    /// Position in the display/execution sequence.
    pub order: i64,

    /// Wall-clock execution time in seconds, once known. Never negative.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub execution_time: Option<f64>,
}

impl PipelineComponent {
    /// Create a component with no execution time recorded.
    pub fn new(name: impl Into<String>, order: i64) -> Self {
        Self {
            name: name.into(),
            order,
            execution_time: None,
        }
    }

    /// Set the execution time in seconds.
    pub fn execution_time(mut self, seconds: f64) -> Self {
        self.execution_time = Some(seconds);
        self
    }

    /// The prefix under which this component's fields appear in the data map.
    pub fn field_prefix(&self) -> String {
        field_prefix(&self.name)
    }
}

/// Build the `"<name>."` prefix used by composite data-map keys.
pub fn field_prefix(name: &str) -> String {
    let mut prefix = String::with_capacity(name.len() + 1);
    prefix.push_str(name);
    prefix.push('.');
    prefix
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_builder() {
        let component = PipelineComponent::new("parser", 3).execution_time(1.25);
        assert_eq!(component.name, "parser");
        assert_eq!(component.order, 3);
        assert_eq!(component.execution_time, Some(1.25));
        assert_eq!(component.field_prefix(), "parser.");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_execution_time_optional() {
        let component: PipelineComponent =
            serde_json::from_str(r#"{"name":"ingest","order":1}"#).unwrap();
        assert_eq!(component, PipelineComponent::new("ingest", 1));

        let json = serde_json::to_string(&component).unwrap();
        assert!(!json.contains("execution_time"));
    }
}
