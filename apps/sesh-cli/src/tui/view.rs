use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Clear, List, ListItem, ListState, Paragraph, Wrap};
use sesh_core::{ConnectionStatus, ExecStatus, PlaybackState, VisibleCommand};
use sesh_prompt::PromptKind;

use super::app::{App, Mode};
use super::theme::Palette;

const KEY_HINTS: &str = "j/k select  J/K move  / filter  e args  n note  m meta  d delete  \
    r run  p play  s stop  t delay  u/U undo/redo  X clear  z reset  w save  o open  T theme  q quit";

pub fn draw(frame: &mut Frame, app: &App) {
    let palette = Palette::for_theme(app.theme);
    let area = frame.area();
    frame.render_widget(Block::default().style(palette.base()), area);

    let [header, body, footer] = Layout::vertical([
        Constraint::Length(4),
        Constraint::Min(5),
        Constraint::Length(2),
    ])
    .areas(area);
    let [list, detail] =
        Layout::horizontal([Constraint::Percentage(55), Constraint::Percentage(45)]).areas(body);

    let rows = app.editor.visible();
    draw_header(frame, header, app, &palette);
    draw_commands(frame, list, app, &rows, &palette);
    draw_detail(frame, detail, app, &palette);
    draw_footer(frame, footer, app, &palette);

    if !matches!(app.mode, Mode::Normal | Mode::Filter) {
        draw_input(frame, app, &palette);
    }
    if app.slot.is_open() {
        draw_prompt(frame, app, &palette);
    }
}

fn draw_header(frame: &mut Frame, area: Rect, app: &App, palette: &Palette) {
    let meta = &app.editor.session().metadata;
    let name = if meta.name.is_empty() { "(untitled)" } else { meta.name.as_str() };

    let connection_color = match app.connection {
        ConnectionStatus::Connected => palette.ok,
        ConnectionStatus::Offline => palette.error,
        ConnectionStatus::Unknown => palette.muted,
    };
    let playback = match app.controller.state() {
        PlaybackState::Idle => "idle".to_owned(),
        PlaybackState::Running(ticket) => format!("running #{}", ticket.index + 1),
        PlaybackState::PausedOnError(ticket) => format!("paused on #{}", ticket.index + 1),
        PlaybackState::Stopped => "stopped".to_owned(),
    };

    let text = Text::from(vec![
        Line::from(vec![
            Span::styled(name.to_owned(), palette.title()),
            Span::styled(format!("  model: {}", meta.model), palette.muted()),
            Span::styled(format!("  created: {}", meta.created_at), palette.muted()),
        ]),
        Line::from(vec![
            Span::raw(format!("{}  ", app.server_url)),
            Span::styled(
                format!("● {}", app.connection.label()),
                Style::default().fg(connection_color),
            ),
            Span::styled(
                format!(
                    "   playback: {playback}   delay: {} ms",
                    app.controller.delay().as_millis()
                ),
                palette.muted(),
            ),
        ]),
    ]);

    let block = Block::bordered()
        .border_style(palette.border())
        .title(Span::styled(format!(" {} ", app.source.display()), palette.title()));
    frame.render_widget(Paragraph::new(text).block(block), area);
}

fn status_span(status: &ExecStatus, palette: &Palette) -> Span<'static> {
    match status {
        ExecStatus::NotRun => Span::styled(" · ", palette.muted()),
        ExecStatus::Running(_) => Span::styled(" … ", Style::default().fg(palette.warn)),
        ExecStatus::Succeeded => Span::styled(" ✓ ", Style::default().fg(palette.ok)),
        ExecStatus::Failed(_) => Span::styled(" ✗ ", Style::default().fg(palette.error)),
    }
}

fn draw_commands(frame: &mut Frame, area: Rect, app: &App, rows: &[VisibleCommand<'_>], palette: &Palette) {
    let items: Vec<ListItem> = rows
        .iter()
        .map(|row| {
            let mut spans = vec![
                status_span(row.status, palette),
                Span::styled(format!("#{:<3} ", row.index + 1), palette.muted()),
                Span::styled(
                    row.command.tool.clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
            ];
            if let Some(description) = &row.command.description {
                spans.push(Span::styled(format!("  {description}"), palette.muted()));
            }
            if row.last_moved {
                spans.push(Span::styled("  ↕", Style::default().fg(palette.accent)));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let mut title = format!(" Commands {}/{} ", rows.len(), app.editor.len());
    if !app.editor.filter().is_empty() {
        title.push_str(&format!("filter: {} ", app.editor.filter()));
    }

    let list = List::new(items)
        .block(
            Block::bordered()
                .border_style(palette.border())
                .title(Span::styled(title, palette.title())),
        )
        .highlight_style(palette.selected());
    let mut state = ListState::default().with_selected((!rows.is_empty()).then_some(app.selected));
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_detail(frame: &mut Frame, area: Rect, app: &App, palette: &Palette) {
    let block = Block::bordered()
        .border_style(palette.border())
        .title(Span::styled(" Details ", palette.title()));

    let Some((index, command)) = app
        .selected_index()
        .and_then(|i| app.editor.command(i).map(|c| (i, c)))
    else {
        let empty = Paragraph::new(Span::styled("No command selected", palette.muted())).block(block);
        frame.render_widget(empty, area);
        return;
    };

    let mut lines = vec![
        Line::from(vec![
            Span::styled(format!("#{} ", index + 1), palette.muted()),
            Span::styled(command.tool.clone(), palette.title()),
        ]),
        Line::from(Span::styled(
            format!("timestamp: {}", command.timestamp_secs()),
            palette.muted(),
        )),
    ];
    if let Some(description) = &command.description {
        lines.push(Line::from(description.clone()));
    }
    if let Some(ExecStatus::Failed(error)) = app.editor.status(index) {
        lines.push(Line::from(Span::styled(
            format!("error: {error}"),
            Style::default().fg(palette.error),
        )));
    }
    lines.push(Line::default());
    let arguments = app.editor.arguments_text(index).unwrap_or_default();
    lines.extend(arguments.lines().map(|l| Line::from(l.to_owned())));

    let paragraph = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn draw_footer(frame: &mut Frame, area: Rect, app: &App, palette: &Palette) {
    let status = match &app.mode {
        Mode::Filter => Line::from(vec![
            Span::styled("/", Style::default().fg(palette.accent)),
            Span::raw(format!("{}_", app.editor.filter())),
            Span::styled("   Enter keep  Esc clear", palette.muted()),
        ]),
        _ => Line::from(app.notice.clone().unwrap_or_default()),
    };
    let text = Text::from(vec![status, Line::from(Span::styled(KEY_HINTS, palette.muted()))]);
    frame.render_widget(Paragraph::new(text), area);
}

fn draw_input(frame: &mut Frame, app: &App, palette: &Palette) {
    let (title, input, error, hint) = match &app.mode {
        Mode::Arguments {
            index,
            input,
            error,
        } => (
            format!(" Arguments of #{} ", index + 1),
            input.as_str(),
            error.as_deref(),
            "valid JSON applies as typed  Ctrl+S/Esc close",
        ),
        Mode::Description { index, input } => (
            format!(" Description of #{} ", index + 1),
            input.as_str(),
            None,
            "Enter save (empty clears)  Esc cancel",
        ),
        Mode::Metadata { field, input } => (
            format!(" Session {} ", field.label()),
            input.as_str(),
            None,
            "Enter save  Tab next field  Esc cancel",
        ),
        Mode::Delay { input } => (
            " Playback delay (ms) ".to_owned(),
            input.as_str(),
            None,
            "Enter apply  Esc cancel",
        ),
        Mode::Open { input } => (
            " Open session ".to_owned(),
            input.as_str(),
            None,
            "Enter load  Esc cancel",
        ),
        Mode::Normal | Mode::Filter => return,
    };

    let mut lines: Vec<Line> = input.lines().map(|l| Line::from(l.to_owned())).collect();
    if input.is_empty() || input.ends_with('\n') {
        lines.push(Line::default());
    }
    if let Some(last) = lines.last_mut() {
        last.push_span(Span::styled("_", Style::default().fg(palette.accent)));
    }
    lines.push(Line::default());
    if let Some(error) = error {
        lines.push(Line::from(Span::styled(
            format!("Invalid JSON: {error}"),
            Style::default().fg(palette.error),
        )));
    }
    lines.push(Line::from(Span::styled(hint, palette.muted())));

    let area = centered_rect(70, 60, frame.area());
    frame.render_widget(Clear, area);
    let border = if error.is_some() { palette.error } else { palette.accent };
    let block = Block::bordered()
        .border_style(Style::default().fg(border))
        .title(Span::styled(title, palette.title()))
        .style(palette.base());
    frame.render_widget(
        Paragraph::new(Text::from(lines))
            .block(block)
            .wrap(Wrap { trim: false }),
        area,
    );
}

fn draw_prompt(frame: &mut Frame, app: &App, palette: &Palette) {
    let Some(prompt) = app.slot.current() else {
        return;
    };

    let mut lines: Vec<Line> = prompt
        .message
        .lines()
        .map(|l| Line::from(l.to_owned()))
        .collect();
    lines.push(Line::default());
    let buttons = match prompt.kind {
        PromptKind::Confirm => "[y] Yes   [n] No",
        PromptKind::Alert => "[Enter] OK",
    };
    lines.push(Line::from(Span::styled(buttons, palette.title())));
    if app.waiting_prompts() > 0 {
        lines.push(Line::from(Span::styled(
            format!("{} more waiting", app.waiting_prompts()),
            palette.muted(),
        )));
    }

    let area = centered_rect(60, 35, frame.area());
    frame.render_widget(Clear, area);
    let block = Block::bordered()
        .border_style(Style::default().fg(palette.warn))
        .title(Span::styled(format!(" {} ", prompt.title), palette.title()))
        .style(palette.base());
    frame.render_widget(
        Paragraph::new(Text::from(lines))
            .block(block)
            .wrap(Wrap { trim: false }),
        area,
    );
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let [_, middle, _] = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .areas(area);
    let [_, center, _] = Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .areas(middle);
    center
}
