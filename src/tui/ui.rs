use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState},
};
use std::time::Instant;

use super::app::App;
use crate::jobs::{JobState, format_elapsed, format_memory};
use crate::monitor::{COLUMNS, job_cells};

fn state_color(state: &JobState) -> Color {
    match state {
        JobState::Running | JobState::Completing => Color::Green,
        JobState::Pending | JobState::Suspended => Color::Yellow,
        JobState::Completed => Color::Cyan,
        JobState::Preempted => Color::Magenta,
        s if s.is_failure() => Color::Red,
        _ => Color::Gray,
    }
}

pub fn draw(f: &mut Frame, app: &App) {
    let stale = app.snapshot().is_stale();

    let mut constraints = vec![
        Constraint::Length(3), // Header
        Constraint::Length(3), // Job statistics
        Constraint::Min(5),    // Job table
    ];
    if stale {
        constraints.push(Constraint::Length(1)); // Error line
    }
    constraints.push(Constraint::Length(1)); // Footer (hotkeys only)

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(f.area());

    draw_header(f, app, chunks[0]);
    draw_stats_bar(f, app, chunks[1]);
    draw_job_table(f, app, chunks[2]);

    if stale {
        draw_error_line(f, app, chunks[3]);
        draw_footer(f, chunks[4]);
    } else {
        draw_footer(f, chunks[3]);
    }

    if app.show_detail {
        draw_detail_popup(f, app);
    }
}

fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let paused = if app.paused { " [PAUSED]" } else { "" };
    let title = format!(" smtop - Snakemake Slurm Monitor{} ", paused);

    let workflow = app
        .workflow_filter()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "All".to_string());

    let updated = app
        .snapshot()
        .updated_at
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "never".to_string());

    let mut spans = vec![
        Span::styled(" Workflow: ", Style::default().fg(Color::DarkGray)),
        Span::styled(workflow, Style::default().fg(Color::Yellow)),
        Span::raw("  "),
        Span::styled("Updated: ", Style::default().fg(Color::DarkGray)),
        Span::styled(updated, Style::default().fg(Color::Cyan)),
        Span::raw("  "),
        Span::styled("Source: ", Style::default().fg(Color::DarkGray)),
        Span::raw(app.source_label().to_string()),
    ];

    if let Some(secs) = app.seconds_until_refresh(Instant::now()) {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("[next in {}s]", secs),
            Style::default().fg(Color::DarkGray),
        ));
    }

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let paragraph = Paragraph::new(Line::from(spans)).block(block);
    f.render_widget(paragraph, area);
}

fn draw_stats_bar(f: &mut Frame, app: &App, area: Rect) {
    let stats = &app.snapshot().stats;

    let mut spans = vec![Span::raw(" Jobs  ")];
    spans.push(Span::styled("Total: ", Style::default().fg(Color::DarkGray)));
    spans.push(Span::styled(
        stats.total().to_string(),
        Style::default().add_modifier(Modifier::BOLD),
    ));

    for (state, count) in stats.iter() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("{}: ", state),
            Style::default().fg(Color::DarkGray),
        ));
        spans.push(Span::styled(
            count.to_string(),
            Style::default().fg(state_color(state)),
        ));
    }

    let block = Block::default()
        .title(" Job Statistics ")
        .borders(Borders::ALL);

    let paragraph = Paragraph::new(Line::from(spans)).block(block);
    f.render_widget(paragraph, area);
}

fn draw_job_table(f: &mut Frame, app: &App, area: Rect) {
    let header_cells = COLUMNS.iter().map(|c| {
        let label = if c.header == app.sort_by.label() {
            format!("{}{}", c.header, if app.sort_ascending { "▲" } else { "▼" })
        } else {
            c.header.to_string()
        };
        Cell::from(label).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });
    let header = Row::new(header_cells).height(1);

    let jobs = app.visible_jobs();

    let rows: Vec<Row> = jobs
        .iter()
        .enumerate()
        .map(|(i, job)| {
            let [job_id, name, rule, state, elapsed, memory, cpus] = job_cells(job);

            let style = if i == app.selected_index {
                Style::default()
                    .bg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };

            Row::new(vec![
                Cell::from(job_id),
                Cell::from(name),
                Cell::from(rule).style(Style::default().fg(Color::LightBlue)),
                Cell::from(state).style(Style::default().fg(state_color(&job.state))),
                Cell::from(elapsed),
                Cell::from(format!("{:>width$}", memory, width = COLUMNS[5].width)),
                Cell::from(format!("{:>width$}", cpus, width = COLUMNS[6].width)),
            ])
            .style(style)
        })
        .collect();

    let widths: Vec<Constraint> = COLUMNS
        .iter()
        .enumerate()
        .map(|(i, c)| {
            // name takes the slack
            if i == 1 {
                Constraint::Min(c.width as u16)
            } else {
                Constraint::Length(c.width as u16)
            }
        })
        .collect();

    let title = if app.show_all {
        format!(" All Jobs ({}) ", jobs.len())
    } else {
        format!(" Active Jobs ({}) ", jobs.len())
    };

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    let mut state = TableState::default();
    if !jobs.is_empty() {
        state.select(Some(app.selected_index));
    }

    f.render_stateful_widget(table, area, &mut state);
}

fn draw_error_line(f: &mut Frame, app: &App, area: Rect) {
    let snapshot = app.snapshot();
    let Some(err) = &snapshot.last_error else {
        return;
    };

    let line = Line::from(vec![
        Span::styled(
            " Status source unavailable",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(
                " ({} failed tick{}, showing last known state): ",
                snapshot.consecutive_failures,
                if snapshot.consecutive_failures == 1 { "" } else { "s" }
            ),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(err.clone(), Style::default().fg(Color::Red)),
    ]);

    f.render_widget(Paragraph::new(line), area);
}

fn draw_footer(f: &mut Frame, area: Rect) {
    let footer = Line::from(vec![Span::styled(
        " [q]uit [r]efresh [p]ause [a]ll/active [s]ort [S] reverse [enter] detail",
        Style::default().fg(Color::DarkGray),
    )]);

    let paragraph = Paragraph::new(footer);
    f.render_widget(paragraph, area);
}

fn draw_detail_popup(f: &mut Frame, app: &App) {
    let Some(job) = app.selected_job() else {
        return;
    };

    let area = centered_rect(60, 60, f.area());

    // Clear the area
    f.render_widget(Clear, area);

    let field = |label: &str, value: String, color: Color| {
        Line::from(vec![
            Span::raw(format!("{}: ", label)),
            Span::styled(value, Style::default().fg(color)),
        ])
    };
    let or_dash = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());

    let elapsed = match job.elapsed_secs() {
        Some(secs) => format!("{} ({})", or_dash(&job.elapsed), format_elapsed(secs)),
        None => or_dash(&job.elapsed),
    };

    let content = vec![
        Line::from(vec![
            Span::styled("Job: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(job.job_id.clone()),
        ]),
        Line::from(""),
        field("Name", job.name.clone(), Color::White),
        field(
            "Workflow",
            or_dash(&job.workflow_id),
            Color::Yellow,
        ),
        field("Rule", or_dash(&job.rule), Color::LightBlue),
        field("State", job.state.to_string(), state_color(&job.state)),
        Line::from(""),
        field("Start", or_dash(&job.start), Color::Cyan),
        field("End", or_dash(&job.end), Color::Cyan),
        field("Elapsed", elapsed, Color::Cyan),
        field("Max RSS", format_memory(job.max_rss), Color::Magenta),
        field(
            "CPUs",
            job.cpus.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string()),
            Color::Magenta,
        ),
        Line::from(""),
        Line::from(Span::styled(
            "Press ESC or Enter to close",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let paragraph = Paragraph::new(content).block(
        Block::default()
            .title(format!(" Job {} Details ", job.job_id))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow)),
    );

    f.render_widget(paragraph, area);
}

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
