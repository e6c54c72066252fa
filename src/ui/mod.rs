//! Terminal rendering using ratatui.

pub mod common;
pub mod components;
pub mod detail;
pub mod theme;

pub use theme::Theme;

use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Style},
    widgets::Paragraph,
    Frame,
};

use crate::app::App;

/// Minimum terminal size for usable display.
pub const MIN_WIDTH: u16 = 50;
pub const MIN_HEIGHT: u16 = 10;

/// Screen row where component rows start (header + table border + table header).
pub const CONTENT_START_ROW: u16 = 2;

/// Draw one full frame.
pub fn draw(frame: &mut Frame, app: &App) {
    let area = frame.area();

    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        let msg = format!(
            "Terminal too small: {}x{}\nMinimum: {}x{}\n\nResize to continue",
            area.width, area.height, MIN_WIDTH, MIN_HEIGHT
        );
        let paragraph = Paragraph::new(msg)
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Yellow));
        let centered = Rect::new(0, (area.height / 2).saturating_sub(2), area.width, 5.min(area.height));
        frame.render_widget(paragraph, centered);
        return;
    }

    let chunks = Layout::vertical([
        Constraint::Length(1), // Header bar
        Constraint::Min(5),    // Components
        Constraint::Length(1), // Status bar or prompt
    ])
    .split(area);

    common::render_header(frame, app, chunks[0]);
    components::render(frame, app, chunks[1]);

    if app.prompt.is_some() {
        common::render_prompt(frame, app, chunks[2]);
    } else {
        common::render_status_bar(frame, app, chunks[2]);
    }

    if app.show_detail_overlay {
        detail::render_overlay(frame, app, area);
    }

    if app.show_help {
        common::render_help(frame, app, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::app as test_app;
    use crate::app::PromptKind;
    use ratatui::{backend::TestBackend, Terminal};

    fn render(app: &App, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|frame| draw(frame, app)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content()
            .chunks(width as usize)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[tokio::test]
    async fn test_draw_empty_snapshot() {
        let (app, _attempts) = test_app();
        let screen = render(&app, 100, 20);
        assert!(screen.contains("PIPEWATCH"));
        assert!(screen.contains("p1"));
        assert!(screen.contains("disconnected"));
        assert!(screen.contains("Components (0)"));
    }

    #[tokio::test]
    async fn test_draw_components_and_detail() {
        let (mut app, _attempts) = test_app();
        app.snapshot.components = vec![
            pipewatch_types::PipelineComponent::new("join", 2).execution_time(2.5),
            pipewatch_types::PipelineComponent::new("ingest", 1),
        ];
        app.snapshot
            .data
            .insert("join.rows".to_string(), "42".to_string());

        let screen = render(&app, 100, 20);
        let ingest = screen.find("ingest").unwrap();
        let join = screen.find("join").unwrap();
        assert!(ingest < join, "components are shown in order");
        assert!(screen.contains("2.50s"));

        app.select_last();
        app.enter_detail();
        let screen = render(&app, 100, 20);
        assert!(screen.contains("Component Detail"));
        assert!(screen.contains("rows"));
        assert!(screen.contains("42"));
    }

    #[tokio::test]
    async fn test_draw_huge_execution_time() {
        let (mut app, _attempts) = test_app();
        app.snapshot.components =
            vec![pipewatch_types::PipelineComponent::new("ingest", 1).execution_time(1e20)];

        let screen = render(&app, 100, 20);
        assert!(screen.contains("ingest"));

        app.enter_detail();
        let screen = render(&app, 100, 20);
        assert!(screen.contains("Component Detail"));
        assert!(screen.contains("100000000000000000000s"));
    }

    #[tokio::test]
    async fn test_draw_detail_on_very_wide_terminal() {
        let (mut app, _attempts) = test_app();
        app.snapshot.components = vec![pipewatch_types::PipelineComponent::new("ingest", 1)];
        app.enter_detail();

        let screen = render(&app, 1000, 20);
        assert!(screen.contains("Component Detail"));
    }

    #[tokio::test]
    async fn test_draw_prompt_and_small_terminal() {
        let (mut app, _attempts) = test_app();
        app.start_prompt(PromptKind::Query);
        app.prompt_push('x');
        assert!(render(&app, 100, 20).contains("query> x"));

        assert!(render(&app, 30, 8).contains("Terminal too small"));
    }
}
