//! Theme configuration for the TUI.
//!
//! Supports light and dark themes with automatic terminal detection.

use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::block::BorderType;

use crate::link::ConnectionState;
use pipewatch_types::PipelineStatus;

/// Color and style theme for the TUI.
///
/// Use [`Theme::auto_detect()`] for automatic theme selection based on
/// terminal background, or [`Theme::dark()`]/[`Theme::light()`] explicitly.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Accent color for highlights and active elements.
    pub highlight: Color,
    /// Color for paused or transitional states.
    pub warning: Color,
    /// Color for error states.
    pub critical: Color,
    /// Color for running and connected states.
    pub healthy: Color,
    /// Color for finished pipelines.
    pub done: Color,
    /// Color for borders and separators.
    pub border: Color,
    /// Style for header rows in tables.
    pub header: Style,
    /// Style for selected/highlighted rows.
    pub selected: Style,
    /// Border style (rounded, plain, etc.).
    pub border_type: BorderType,
}

impl Theme {
    /// Create a dark theme suitable for dark terminal backgrounds.
    pub fn dark() -> Self {
        Self {
            highlight: Color::Cyan,
            warning: Color::Yellow,
            critical: Color::Red,
            healthy: Color::Green,
            done: Color::Blue,
            border: Color::Gray,
            header: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            selected: Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD),
            border_type: BorderType::Rounded,
        }
    }

    /// Create a light theme suitable for light terminal backgrounds.
    pub fn light() -> Self {
        Self {
            highlight: Color::Blue,
            warning: Color::Yellow,
            critical: Color::Red,
            healthy: Color::Green,
            done: Color::Magenta,
            border: Color::DarkGray,
            header: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            selected: Style::default().bg(Color::LightBlue).add_modifier(Modifier::BOLD),
            border_type: BorderType::Rounded,
        }
    }

    /// Auto-detect based on terminal background
    pub fn auto_detect() -> Self {
        match terminal_light::luma() {
            Ok(luma) if luma > 0.5 => Self::light(),
            _ => Self::dark(),
        }
    }

    /// Get style for a pipeline status
    pub fn status_style(&self, status: PipelineStatus) -> Style {
        match status {
            PipelineStatus::Initialized => Style::default().add_modifier(Modifier::DIM),
            PipelineStatus::Running => Style::default().fg(self.healthy),
            PipelineStatus::Paused => Style::default().fg(self.warning),
            PipelineStatus::Completed => Style::default().fg(self.done),
            PipelineStatus::Error => Style::default().fg(self.critical).add_modifier(Modifier::BOLD),
        }
    }

    /// Get style for a connection state
    pub fn link_style(&self, state: ConnectionState) -> Style {
        match state {
            ConnectionState::Connected => Style::default().fg(self.healthy),
            ConnectionState::Connecting | ConnectionState::Reconnecting => {
                Style::default().fg(self.warning)
            }
            ConnectionState::Disconnected | ConnectionState::ShuttingDown => {
                Style::default().add_modifier(Modifier::DIM)
            }
        }
    }
}
