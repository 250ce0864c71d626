use crate::app::{App, InputMode};
use crate::calendar::{Action, Event};
use chrono::{Duration, FixedOffset, NaiveDate};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};

fn action_label(action: Action, success: bool) -> Span<'static> {
    let color = match (action, success) {
        (_, false) => Color::Red,
        (Action::Create, true) => Color::Green,
        (Action::Delete, true) => Color::Magenta,
        (Action::View, true) => Color::Blue,
    };
    Span::styled(
        format!("[{}] ", action.to_string().to_uppercase()),
        Style::default().fg(color),
    )
}

fn event_item(event: &Event, tz: FixedOffset, today: NaiveDate, show_date: bool) -> ListItem<'_> {
    let local = event.start.with_timezone(&tz);

    let when = if !show_date {
        local.format("%H:%M").to_string()
    } else if local.date_naive() == today + Duration::days(1) {
        format!("TOMORROW {}", local.format("%H:%M"))
    } else {
        local.format("%a %m/%d %H:%M").to_string()
    };

    let mut spans = vec![
        Span::styled(format!("{} ", when), Style::default().fg(Color::Green)),
        Span::raw(event.summary.as_str()),
    ];
    if let Some(location) = &event.location {
        spans.push(Span::styled(
            format!(" @{}", location),
            Style::default().fg(Color::Cyan),
        ));
    }

    ListItem::new(Line::from(spans))
}

pub fn ui(f: &mut Frame, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([Constraint::Min(3), Constraint::Length(3)].as_ref())
        .split(f.area());

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)].as_ref())
        .split(rows[0]);

    let panels = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)].as_ref())
        .split(columns[0]);

    // Conversation history
    let items: Vec<ListItem> = app
        .history
        .iter()
        .map(|exchange| {
            ListItem::new(Line::from(vec![
                action_label(exchange.response.action, exchange.response.success),
                Span::raw(exchange.question.as_str()),
            ]))
        })
        .collect();

    let mut state = ListState::default();
    if !app.history.is_empty() {
        state.select(Some(app.selected));
    }

    let history = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("History (q: quit, i: ask, k/j: move, r: refresh, c: clear)"),
        )
        .highlight_style(
            Style::default()
                .fg(Color::Blue)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    f.render_stateful_widget(history, panels[0], &mut state);

    // Answer for the selected question
    let answer = app
        .selected_exchange()
        .map(|exchange| exchange.response.answer.as_str())
        .unwrap_or("Press 'i' and ask something like: schedule gym tomorrow at 7am");
    let answer_box = Paragraph::new(answer)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Answer"));
    f.render_widget(answer_box, panels[1]);

    // Calendar panels
    let tz = app.orchestrator.settings().time_zone;
    let current_day = app.orchestrator.now().date_naive();
    let calendar = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)].as_ref())
        .split(columns[1]);

    let today_title = match &app.next_event {
        Some(next) => format!("Today ({}) - next: {}", app.today.len(), next.summary),
        None => format!("Today ({})", app.today.len()),
    };
    let today = List::new(app.today.iter().map(|e| event_item(e, tz, current_day, false)).collect::<Vec<_>>())
        .block(Block::default().borders(Borders::ALL).title(today_title));
    f.render_widget(today, calendar[0]);

    let upcoming = List::new(app.upcoming.iter().map(|e| event_item(e, tz, current_day, true)).collect::<Vec<_>>())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Upcoming ({})", app.upcoming.len())),
        );
    f.render_widget(upcoming, calendar[1]);

    if let InputMode::Editing = app.input_mode {
        let input_box = Paragraph::new(app.input_buffer.as_str())
            .style(Style::default().fg(Color::Yellow))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Ask (Enter to send, Esc to cancel) - Try: 'what do I have tomorrow?'"),
            );
        f.render_widget(input_box, rows[1]);

        f.set_cursor_position(ratatui::layout::Position {
            x: rows[1].x + app.input_buffer.chars().count() as u16 + 1,
            y: rows[1].y + 1,
        });
    } else {
        let hint = Paragraph::new("Normal mode").style(Style::default().fg(Color::DarkGray));
        f.render_widget(hint, rows[1]);
    }
}
