use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row as TableRow, Table};
use sniffer_sdk::Field;
use tracing::trace;

use crate::client::view::ViewContext;
use crate::table::ColumnVisibility;

const ID_WIDTH: u16 = 8;
const MIN_COLUMN_WIDTH: u16 = 6;
const CHOOSER_WIDTH: u16 = 32;

fn changed_cell_style() -> Style {
    Style::default().fg(Color::Black).bg(Color::Yellow)
}

fn dirty_header_style() -> Style {
    Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
}

/// Shown columns and their widths, rebuilt only when the visibility
/// generation moves.
#[derive(Debug, Clone, Default)]
pub struct ColumnLayout {
    generation: Option<u64>,
    columns: Vec<usize>,
    widths: Vec<Constraint>,
}

impl ColumnLayout {
    pub fn refresh(&mut self, visibility: &ColumnVisibility, schema: &[Field]) -> bool {
        let generation = visibility.generation();
        if self.generation == Some(generation) {
            return false;
        }
        self.columns = visibility.visible_columns();
        self.widths = std::iter::once(Constraint::Length(ID_WIDTH))
            .chain(self.columns.iter().map(|&col| {
                let name_len = schema.get(col).map_or(1, |f| f.name.len());
                Constraint::Length((name_len as u16).max(MIN_COLUMN_WIDTH))
            }))
            .collect();
        self.generation = Some(generation);
        trace!(
            target = "slate::render",
            generation,
            columns = self.columns.len(),
            "column layout rebuilt"
        );
        true
    }

    pub fn generation(&self) -> Option<u64> {
        self.generation
    }

    pub fn columns(&self) -> &[usize] {
        &self.columns
    }

    /// Id column first, then one per shown column.
    pub fn widths(&self) -> &[Constraint] {
        &self.widths
    }
}

/// Draws one frame of the view and keeps the viewport height in sync with
/// the space the table actually gets.
pub fn render_frame(frame: &mut Frame, ctx: &mut ViewContext) {
    let footer_height = if ctx.prefill().is_some() { 2 } else { 1 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(footer_height),
        ])
        .split(frame.area());

    ctx.refresh_layout();
    render_header(frame, chunks[0], ctx);

    let body = if ctx.chooser_open() {
        let split = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(20), Constraint::Length(CHOOSER_WIDTH)])
            .split(chunks[1]);
        render_chooser(frame, split[1], ctx);
        split[0]
    } else {
        chunks[1]
    };

    // Borders take two lines and the column header one more.
    let rows_height = body.height.saturating_sub(3) as usize;
    ctx.viewport_mut().set_height(rows_height);
    render_table(frame, body, ctx);
    render_footer(frame, chunks[2], ctx);
}

fn render_header(frame: &mut Frame, area: Rect, ctx: &ViewContext) {
    let status = ctx.status();
    let status_style = match status.capturing() {
        Some(true) => Style::default().fg(Color::Green),
        Some(false) => Style::default().fg(Color::Red),
        None => Style::default().fg(Color::Gray),
    };
    let button_style = if status.is_pending() {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Cyan)
    };
    let line = Line::from(vec![
        Span::styled(
            ctx.service().to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(status.status_label(), status_style),
        Span::raw("  "),
        Span::styled(format!("s: {}", status.button_label()), button_style),
        Span::styled(
            "  c: columns  p: prefill  i: inject  q: quit",
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn render_table(frame: &mut Frame, area: Rect, ctx: &ViewContext) {
    let table = ctx.table();
    let columns = ctx.layout().columns();
    let schema = ctx.schema();

    let mut header = vec![Cell::from("#")];
    for &col in columns {
        let name = schema.get(col).map(|f| f.name.as_str()).unwrap_or("?");
        let cell = Cell::from(name.to_string());
        header.push(if table.dirty_columns().contains(&col) {
            cell.style(dirty_header_style())
        } else {
            cell
        });
    }

    let rows = ctx.viewport().visible_range().filter_map(|idx| {
        let row = table.rows().get(idx)?;
        let mut cells = vec![Cell::from(row.id.to_string())];
        for &col in columns {
            let text = match (schema.get(col), row.values.get(col)) {
                (Some(field), Some(value)) => field.field_type.format(value),
                _ => String::new(),
            };
            let cell = Cell::from(text);
            cells.push(if table.is_changed(idx, col) {
                cell.style(changed_cell_style())
            } else {
                cell
            });
        }
        Some(TableRow::new(cells))
    });

    let widget = Table::new(rows, ctx.layout().widths().to_vec())
        .header(TableRow::new(header).style(Style::default().add_modifier(Modifier::BOLD)))
        .column_spacing(2)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(widget, area);
}

fn render_chooser(frame: &mut Frame, area: Rect, ctx: &ViewContext) {
    let visibility = ctx.table().visibility();
    let lines: Vec<Line> = ctx
        .schema()
        .iter()
        .enumerate()
        .map(|(idx, field)| {
            let mark = if visibility.is_visible(idx) { "[x]" } else { "[ ]" };
            let changed = if visibility.is_changed(idx) { " *" } else { "" };
            let mut style = if visibility.is_changed(idx) {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default()
            };
            if idx == ctx.chooser_cursor() {
                style = style.add_modifier(Modifier::REVERSED);
            }
            Line::from(Span::styled(
                format!("{mark} {}{changed}", field.name),
                style,
            ))
        })
        .collect();
    let panel = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" columns: a all  h none  o changed "),
    );
    frame.render_widget(panel, area);
}

fn render_footer(frame: &mut Frame, area: Rect, ctx: &ViewContext) {
    let mode = ctx.autoscroll().mode();
    let mode_style = if ctx.autoscroll().is_following() {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::Magenta)
    };
    let watermark = ctx
        .table()
        .watermark()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    let mut spans = vec![
        Span::styled(mode.label(), mode_style),
        Span::raw(format!(
            "  rows {}  last id {}",
            ctx.table().len(),
            watermark
        )),
    ];
    if let Some(text) = ctx.notice() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            text.to_string(),
            Style::default().fg(Color::Yellow),
        ));
    }
    let mut lines = vec![Line::from(spans)];
    if let Some((id, text)) = ctx.prefill() {
        lines.push(Line::from(Span::styled(
            format!("prefill #{id}: {text}"),
            Style::default().fg(Color::DarkGray),
        )));
    }
    frame.render_widget(Paragraph::new(lines), area);
}
