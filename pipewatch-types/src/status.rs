//! Pipeline lifecycle status.

use core::fmt;
use core::str::FromStr;

/// Lifecycle status of a pipeline, as reported by the backend.
///
/// The status is single-valued and last-write-wins: every frame that carries a
/// status replaces the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum PipelineStatus {
    /// Pipeline created, nothing has run yet.
    #[default]
    Initialized,
    /// Components are executing.
    Running,
    /// Execution suspended.
    Paused,
    /// All components finished.
    Completed,
    /// The pipeline failed, or the status stream is currently unavailable.
    Error,
}

impl PipelineStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [PipelineStatus; 5] = [
        PipelineStatus::Initialized,
        PipelineStatus::Running,
        PipelineStatus::Paused,
        PipelineStatus::Completed,
        PipelineStatus::Error,
    ];

    /// The wire name of this status.
    pub const fn as_str(&self) -> &'static str {
        match self {
            PipelineStatus::Initialized => "initialized",
            PipelineStatus::Running => "running",
            PipelineStatus::Paused => "paused",
            PipelineStatus::Completed => "completed",
            PipelineStatus::Error => "error",
        }
    }

    /// Returns a short symbol for display.
    pub const fn symbol(&self) -> &'static str {
        match self {
            PipelineStatus::Initialized => "INIT",
            PipelineStatus::Running => "RUN",
            PipelineStatus::Paused => "PAUSE",
            PipelineStatus::Completed => "DONE",
            PipelineStatus::Error => "ERR",
        }
    }

    /// True once the pipeline can make no further progress on its own.
    pub const fn is_finished(&self) -> bool {
        matches!(self, PipelineStatus::Completed | PipelineStatus::Error)
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a known pipeline status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus;

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown pipeline status")
    }
}

impl FromStr for PipelineStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PipelineStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or(UnknownStatus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_statuses() {
        for status in PipelineStatus::ALL {
            assert_eq!(status.as_str().parse::<PipelineStatus>(), Ok(status));
        }
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!("connected".parse::<PipelineStatus>(), Err(UnknownStatus));
        assert_eq!("Running".parse::<PipelineStatus>(), Err(UnknownStatus));
    }

    #[test]
    fn test_default_is_initialized() {
        assert_eq!(PipelineStatus::default(), PipelineStatus::Initialized);
        assert!(!PipelineStatus::Running.is_finished());
        assert!(PipelineStatus::Completed.is_finished());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&PipelineStatus::Paused).unwrap();
        assert_eq!(json, "\"paused\"");
        let parsed: PipelineStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(parsed, PipelineStatus::Completed);
    }
}
