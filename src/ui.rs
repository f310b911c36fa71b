use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Gauge, Paragraph, Row, Table, Wrap},
    Frame,
};

use crate::app::{App, SyncView};
use crate::event::MailSummary;

const COLUMN_WIDTHS: [Constraint; 4] = [
    Constraint::Percentage(45),
    Constraint::Percentage(25),
    Constraint::Length(17),
    Constraint::Length(8),
];

pub fn ui(f: &mut Frame, app: &App) {
    let size = f.size();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Length(3), // Progress bar
            Constraint::Length(1), // Progress text
            Constraint::Min(0),    // Emails table
            Constraint::Length(1), // Status bar
        ])
        .split(size);

    render_title_bar(f, app, chunks[0]);
    render_progress_bar(f, app.view(), chunks[1]);
    render_progress_text(f, app.view(), chunks[2]);
    render_emails_table(f, app.view(), chunks[3]);
    render_status_bar(f, app, chunks[4]);

    if let Some(error) = app.view().current_error() {
        render_error_popup(f, error, app.view().pending_errors.len(), size);
    }
}

/// Fraction of the bar to fill. Out of range values are drawn at the
/// nearest end, non-numbers as empty.
pub fn display_ratio(percent: Option<f64>) -> f64 {
    match percent {
        Some(p) if p.is_finite() => (p / 100.0).clamp(0.0, 1.0),
        _ => 0.0,
    }
}

/// Fourth column of a row: paperclip and count, empty without attachments
pub fn attachment_indicator(count: u32) -> String {
    if count > 0 {
        format!("📎 {}", count)
    } else {
        String::new()
    }
}

fn render_title_bar(f: &mut Frame, app: &App, area: Rect) {
    let account = match &app.account_id {
        Some(id) => format!("account {}", id),
        None => "no account selected".to_string(),
    };

    let title = Paragraph::new(Line::from(vec![
        Span::styled("Mail sync", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
        Span::raw(" | "),
        Span::raw(account),
    ]))
    .block(Block::default().borders(Borders::BOTTOM));

    f.render_widget(title, area);
}

fn render_progress_bar(f: &mut Frame, view: &SyncView, area: Rect) {
    let label = match view.percent {
        Some(p) if p.is_finite() => format!("{:.0}%", p),
        Some(_) => "--".to_string(),
        None => "Waiting for server".to_string(),
    };

    let gauge = Gauge::default()
        .block(Block::default().title("Progress").borders(Borders::ALL))
        .gauge_style(Style::default().fg(Color::Green).bg(Color::Black))
        .ratio(display_ratio(view.percent))
        .label(label);

    f.render_widget(gauge, area);
}

fn render_progress_text(f: &mut Frame, view: &SyncView, area: Rect) {
    let text = Paragraph::new(view.progress_text.as_str()).style(Style::default().fg(Color::Gray));
    f.render_widget(text, area);
}

fn email_row(summary: &MailSummary) -> Row<'_> {
    Row::new(vec![
        Cell::from(summary.subject.as_str()),
        Cell::from(summary.sender.as_str()),
        Cell::from(summary.date.as_str()),
        Cell::from(attachment_indicator(summary.attachment_count)),
    ])
}

fn render_emails_table(f: &mut Frame, view: &SyncView, area: Rect) {
    let rows: Vec<Row> = view.rows.iter().skip(view.scroll).map(email_row).collect();

    let header = Row::new(vec!["Subject", "Sender", "Date", "Files"])
        .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        .bottom_margin(1);

    let table = Table::new(rows)
        .header(header)
        .block(Block::default().title("Emails").borders(Borders::ALL))
        .widths(&COLUMN_WIDTHS)
        .column_spacing(1);

    f.render_widget(table, area);
}

fn render_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let view = app.view();
    let mut text = format!("Server: {} | ", app.endpoint);

    text.push_str(if app.is_connected() { "Connected | " } else { "Connection closed | " });
    text.push_str(&format!("Emails: {}", view.rows.len()));

    if let Some(last) = view.last_update {
        text.push_str(&format!(" | Last update: {}", last.format("%H:%M:%S")));
    }

    let status = Paragraph::new(text)
        .style(Style::default().bg(Color::Blue).fg(Color::White));

    f.render_widget(status, area);
}

fn render_error_popup(f: &mut Frame, error: &str, pending: usize, area: Rect) {
    let popup_area = centered_rect(60, 30, area);

    let title = if pending > 1 {
        format!("Error (1 of {})", pending)
    } else {
        "Error".to_string()
    };

    let body = vec![
        Line::from(error.to_string()),
        Line::from(""),
        Line::from(Span::styled("Enter: dismiss", Style::default().fg(Color::Gray))),
    ];

    let popup = Paragraph::new(body)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red)),
        )
        .wrap(Wrap { trim: true });

    f.render_widget(Clear, popup_area);
    f.render_widget(popup, popup_area);
}

// Helper function to create a centered rect
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
