//! Detail overlay rendering.
//!
//! Displays a modal overlay with the data fields of the selected component.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table},
    Frame,
};

use crate::app::App;
use crate::data::component_fields;
use crate::data::duration::format_execution_time;

/// Minimum width required for the detail overlay to render properly.
const MIN_OVERLAY_WIDTH: u16 = 40;
/// Minimum height required for the detail overlay to render properly.
const MIN_OVERLAY_HEIGHT: u16 = 10;

/// Render the component detail as a modal overlay.
pub fn render_overlay(frame: &mut Frame, app: &App, area: Rect) {
    if area.width < MIN_OVERLAY_WIDTH || area.height < MIN_OVERLAY_HEIGHT {
        return;
    }

    let Some(component) = app.selected_component() else {
        return;
    };
    let fields = component_fields(&app.snapshot.data, &component.name);

    let overlay_width = (area.width / 5 * 4).clamp(MIN_OVERLAY_WIDTH, 90);
    let overlay_height = (area.height / 5 * 4).clamp(MIN_OVERLAY_HEIGHT, 40);

    let x = area.x + (area.width.saturating_sub(overlay_width)) / 2;
    let y = area.y + (area.height.saturating_sub(overlay_height)) / 2;
    let overlay_area = Rect::new(x, y, overlay_width, overlay_height);

    frame.render_widget(Clear, overlay_area);

    let chunks = Layout::vertical([
        Constraint::Length(4), // Header with component info
        Constraint::Min(4),    // Fields table
        Constraint::Length(1), // Footer
    ])
    .split(overlay_area);

    let header_lines = vec![
        Line::from(vec![Span::styled(
            format!(" {} ", component.name),
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from(vec![
            Span::raw(" Order: "),
            Span::styled(
                component.order.to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw("    Execution time: "),
            Span::styled(
                format_execution_time(component.execution_time),
                Style::default().add_modifier(Modifier::BOLD),
            ),
        ]),
    ];

    let header_block = Block::default()
        .title(" Component Detail ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));
    frame.render_widget(Paragraph::new(header_lines).block(header_block), chunks[0]);

    let fields_block = Block::default()
        .title(format!(" Fields ({}) ", fields.len()))
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.border));

    if fields.is_empty() {
        let empty = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled(
                "  No data reported for this component",
                Style::default().add_modifier(Modifier::DIM),
            )),
        ])
        .block(fields_block);
        frame.render_widget(empty, chunks[1]);
    } else {
        let header = Row::new(vec![Cell::from("Field"), Cell::from("Value")])
            .height(1)
            .style(app.theme.header);
        let rows: Vec<Row> = fields
            .into_iter()
            .map(|field| Row::new(vec![Cell::from(field.key), Cell::from(field.value)]))
            .collect();
        let table = Table::new(rows, [Constraint::Fill(1), Constraint::Fill(2)])
            .header(header)
            .block(fields_block);
        frame.render_widget(table, chunks[1]);
    }

    let footer = Paragraph::new(Line::from(vec![Span::styled(
        " ↑↓ next component | Esc to close ",
        Style::default().add_modifier(Modifier::DIM),
    )]));
    frame.render_widget(footer, chunks[2]);
}
