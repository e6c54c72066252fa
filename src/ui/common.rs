//! Common UI components shared across views.
//!
//! This module contains the header bar, status bar, prompt line, and help overlay.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::app::App;
use crate::data::duration::format_duration;
use crate::link::ConnectionState;

/// Render the header bar with pipeline and link state.
///
/// Displays: pipeline status, subscription, component count, total time, link state.
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let snapshot = &app.snapshot;
    let link = &app.link_status;
    let status_style = app.theme.status_style(snapshot.status);

    // The id the backend reports wins over the one we asked for
    let pipeline = snapshot
        .pipeline_id
        .as_deref()
        .unwrap_or(link.subscription.as_str());

    let mut spans = vec![
        Span::styled(" ● ", status_style),
        Span::styled("PIPEWATCH ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("│ "),
        Span::styled(pipeline.to_string(), Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" │ "),
        Span::styled(
            format!("{} {}", snapshot.status.symbol(), snapshot.status),
            status_style,
        ),
        Span::raw(" │ "),
        Span::styled(
            format!("{}", snapshot.components.len()),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(
            " components │ total {:.2}s │ ",
            snapshot.total_execution_time()
        )),
        Span::styled(link.state.label(), app.theme.link_style(link.state)),
    ];

    if link.attempt > 1 && link.state != ConnectionState::Connected {
        spans.push(Span::raw(format!(" (attempt {})", link.attempt)));
    }
    if let Some(err) = &link.last_error {
        spans.push(Span::raw(" │ "));
        spans.push(Span::styled(
            err.to_string(),
            Style::default().fg(app.theme.critical),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Render the status bar at the bottom.
///
/// Shows: time since last update, query state, available controls.
/// Also displays temporary status messages.
pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(msg) = app.get_status_message() {
        let paragraph =
            Paragraph::new(format!(" {} ", msg)).style(Style::default().fg(app.theme.highlight));
        frame.render_widget(paragraph, area);
        return;
    }

    let updated = match app.last_update {
        Some(at) => format!("Updated {} ago", format_duration(at.elapsed())),
        None => "No updates yet".to_string(),
    };
    let query = if app.query_in_flight() {
        " | query running"
    } else {
        ""
    };
    let controls = if app.show_detail_overlay {
        "↑↓:component Esc:close q:close"
    } else {
        "↑↓:select Enter:detail /:query p:pipeline r:connect ?:help q:quit"
    };

    let paragraph = Paragraph::new(format!(" {}{} | {}", updated, query, controls))
        .style(Style::default().add_modifier(Modifier::DIM));
    frame.render_widget(paragraph, area);
}

/// Render the input line for an open prompt.
pub fn render_prompt(frame: &mut Frame, app: &App, area: Rect) {
    let Some(prompt) = &app.prompt else {
        return;
    };
    let line = Line::from(vec![
        Span::styled(format!(" {}> ", prompt.kind.label()), app.theme.header),
        Span::raw(prompt.text.clone()),
        Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
        Span::styled(
            "   Enter:submit Esc:cancel",
            Style::default().add_modifier(Modifier::DIM),
        ),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

/// Render the help overlay with keyboard shortcuts.
///
/// Displayed as a centered modal on top of the current view.
pub fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let help_text = vec![
        Line::from(vec![Span::styled("Keyboard Shortcuts", app.theme.header)]),
        Line::from(""),
        Line::from(vec![Span::styled(
            " Navigation",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from("  ↑/↓ j/k     Select component"),
        Line::from("  PgUp/PgDn   Jump 10 items"),
        Line::from("  Home/End    Jump to first/last"),
        Line::from("  Enter       Component fields"),
        Line::from("  Esc         Close overlay"),
        Line::from(""),
        Line::from(vec![Span::styled(
            " Pipeline",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from("  /         Submit a query"),
        Line::from("  p         Switch pipeline"),
        Line::from("  r         Connect now"),
        Line::from(""),
        Line::from(vec![Span::styled(
            " General",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from("  ?         Toggle help"),
        Line::from("  q         Quit"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    let paragraph = Paragraph::new(help_text).block(block);

    let help_width = 40u16.min(area.width.saturating_sub(4));
    let help_height = 22u16.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(help_width)) / 2;
    let y = area.y + (area.height.saturating_sub(help_height)) / 2;
    let help_area = Rect::new(x, y, help_width, help_height);

    frame.render_widget(Clear, help_area);
    frame.render_widget(paragraph, help_area);
}
