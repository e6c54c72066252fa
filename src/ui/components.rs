//! Component table rendering.
//!
//! Lists the pipeline's components in execution order with their execution
//! times and how many data fields each one reports.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use crate::app::App;
use crate::data::duration::format_execution_time;
use crate::data::{component_views, unassigned_fields};

/// Render the ordered component table, plus any data no component claims.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let views = component_views(&app.snapshot);
    let extra = unassigned_fields(&app.snapshot);

    let (table_area, extra_area) = if extra.is_empty() {
        (area, None)
    } else {
        let height = extra_panel_height(extra.len(), area.height);
        let chunks = Layout::vertical([Constraint::Min(5), Constraint::Length(height)]).split(area);
        (chunks[0], Some(chunks[1]))
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.border));

    if views.is_empty() {
        let hint = if app.link_status.state == crate::link::ConnectionState::Connected {
            "  Waiting for the pipeline to report its components"
        } else {
            "  No components yet"
        };
        let empty = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled(hint, Style::default().add_modifier(Modifier::DIM))),
        ])
        .block(block.title(" Components (0) "));
        frame.render_widget(empty, table_area);
    } else {
        let header = Row::new(vec![
            Cell::from("#"),
            Cell::from("Component"),
            Cell::from("Time"),
            Cell::from("Fields"),
        ])
        .height(1)
        .style(app.theme.header);

        let rows: Vec<Row> = views
            .iter()
            .map(|view| {
                let fields = if view.fields.is_empty() {
                    "-".to_string()
                } else {
                    view.fields.len().to_string()
                };
                Row::new(vec![
                    Cell::from(view.component.order.to_string()),
                    Cell::from(view.name().to_string()),
                    Cell::from(format_execution_time(view.component.execution_time)),
                    Cell::from(fields),
                ])
            })
            .collect();

        let widths = [
            Constraint::Length(6),  // Order
            Constraint::Fill(3),    // Name
            Constraint::Length(12), // Execution time
            Constraint::Length(8),  // Field count
        ];

        let selected = app.selected_index.min(views.len().saturating_sub(1));
        let title = format!(" Components ({}) [{}/{}] ", views.len(), selected + 1, views.len());

        let table = Table::new(rows, widths)
            .header(header)
            .block(block.title(title))
            .row_highlight_style(app.theme.selected)
            .highlight_symbol("▶ ");

        let mut state = TableState::default();
        state.select(Some(selected));
        frame.render_stateful_widget(table, table_area, &mut state);
    }

    if let Some(extra_area) = extra_area {
        let rows: Vec<Row> = extra
            .iter()
            .map(|(key, value)| Row::new(vec![Cell::from(*key), Cell::from(*value)]))
            .collect();
        let table = Table::new(rows, [Constraint::Fill(1), Constraint::Fill(2)]).block(
            Block::default()
                .title(format!(" Pipeline data ({}) ", extra.len()))
                .borders(Borders::ALL)
                .border_type(app.theme.border_type)
                .border_style(Style::default().fg(app.theme.border)),
        );
        frame.render_widget(table, extra_area);
    }
}

/// Rows plus borders, capped at a third of the area.
fn extra_panel_height(rows: usize, available: u16) -> u16 {
    u16::try_from(rows)
        .unwrap_or(u16::MAX)
        .saturating_add(2)
        .min(available / 3)
        .max(3)
}
