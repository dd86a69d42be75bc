//! UI rendering

use std::time::Instant;

use chrono::{Local, NaiveDateTime};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use signage_core::forms::Draft;
use signage_core::images::ImageStorage;
use signage_core::slider::{format_schedule, SlideText};
use signage_core::storage::KvBackend;
use signage_core::{ContentRecord, RecordKind, Screen, Session, ViewMode};

use super::app::{App, Modal, COVER_FIELDS, ITEM_FIELDS, TIMER_FIELDS};
use crate::output::truncate;

/// Main UI rendering function
pub fn draw<B: KvBackend, S: ImageStorage>(frame: &mut Frame, app: &App<B, S>, now: Instant) {
    // Create vertical layout for status bar at the bottom
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(frame.area());

    match app.kiosk.screen() {
        Screen::View(_) => draw_view(frame, app, chunks[0]),
        Screen::Settings => draw_settings(frame, app, chunks[0]),
        Screen::EditItem { .. } | Screen::EditCover { .. } => draw_record_form(frame, app, chunks[0]),
        Screen::EditOrder => draw_order(frame, app, chunks[0]),
        Screen::EditTimer => draw_timers(frame, app, chunks[0]),
    }

    draw_status_bar(frame, app, chunks[1], now);

    if let Some(modal) = app.modal {
        draw_modal(frame, app, modal);
    }
}

/// Block titled with the screen name and, while it runs, the idle countdown
///
/// The wall clock sits on the right of every screen header.
fn screen_block<B: KvBackend, S: ImageStorage>(app: &App<B, S>) -> Block<'static> {
    let screen = app.kiosk.screen();
    let title = match screen.idle_policy(app.kiosk.home()) {
        Some(_) => format!(" {} ({}s) ", screen, app.kiosk.countdown()),
        None => format!(" {} ", screen),
    };
    let clock = format!(" {} ", clock_text(Local::now().naive_local()));
    Block::default()
        .title(title)
        .title(Line::from(clock).right_aligned())
        .borders(Borders::ALL)
        .border_style(Style::default().add_modifier(Modifier::BOLD))
}

/// Date and 12-hour time, e.g. `2024/07/01 (Mon) PM 01:05:09`
fn clock_text(at: NaiveDateTime) -> String {
    at.format("%Y/%m/%d (%a) %p %I:%M:%S").to_string()
}

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn dim() -> Style {
    Style::default().add_modifier(Modifier::DIM)
}

// ==================== Views ====================

fn draw_view<B: KvBackend, S: ImageStorage>(frame: &mut Frame, app: &App<B, S>, area: Rect) {
    let slider = app.kiosk.slider();
    let block = screen_block(app);

    let Some(slide) = slider.current_slide() else {
        let placeholder = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled("No slides yet", bold())),
            Line::from(Span::styled("Press s to open settings", dim())),
        ])
        .alignment(Alignment::Center)
        .block(block);
        frame.render_widget(placeholder, area);
        return;
    };

    let text = SlideText::from(slide);
    let mut lines = vec![
        Line::from(Span::styled(text.title.clone(), bold().fg(Color::Cyan))),
        Line::from(""),
    ];
    let label_width = text
        .rows
        .iter()
        .map(|(label, _)| label.chars().count())
        .max()
        .unwrap_or(0);
    for (label, value) in &text.rows {
        lines.push(Line::from(vec![
            Span::styled(format!("{:<width$}  ", label, width = label_width), bold()),
            Span::raw(value.clone()),
        ]));
    }
    if let Some(path) = &text.image_path {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(format!("Image: {}", path), dim())));
    }

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);

    // Counter in the bottom-right corner, hidden on covers
    let counter = slider.counter();
    if counter.current > 0 && area.width > 12 && area.height > 2 {
        let label = format!(" {} ", counter);
        let width = label.chars().count() as u16;
        let counter_area = Rect::new(
            area.x + area.width - width - 1,
            area.y + area.height - 1,
            width,
            1,
        );
        frame.render_widget(Paragraph::new(Span::styled(label, dim())), counter_area);
    }
}

// ==================== Settings ====================

fn record_line(record: &ContentRecord, display_number: usize) -> String {
    let detail = match record.kind {
        RecordKind::Item => format_schedule(record.start_date, record.end_date),
        RecordKind::Cover => String::new(),
    };
    format!(
        "{:>2}. {:<5}  {:<30}  {}",
        display_number,
        record.kind,
        truncate(record.title(), 30),
        detail
    )
}

fn draw_settings<B: KvBackend, S: ImageStorage>(frame: &mut Frame, app: &App<B, S>, area: Rect) {
    let count = app.records.len();
    let items: Vec<ListItem> = app
        .records
        .iter()
        .enumerate()
        .map(|(index, record)| ListItem::new(record_line(record, count - index)))
        .collect();

    let block = screen_block(app);
    if items.is_empty() {
        let empty = Paragraph::new(Span::styled("No slides. Press a or c to add one.", dim()))
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(Some(app.selected));
    frame.render_stateful_widget(list, area, &mut state);
}

// ==================== Editors ====================

fn draw_record_form<B: KvBackend, S: ImageStorage>(
    frame: &mut Frame,
    app: &App<B, S>,
    area: Rect,
) {
    let Some(Session::Record(form)) = app.kiosk.session() else {
        return;
    };

    let image_value = if app.on_image_field() && !app.image_input.is_empty() {
        app.image_input.clone()
    } else {
        form.image().display_name().to_string()
    };

    let line_at = |lines: &[String], i: usize| lines.get(i).cloned().unwrap_or_default();
    let (labels, values): (&[&str], Vec<String>) = match form.draft() {
        Draft::Item(draft) => (
            &ITEM_FIELDS[..],
            vec![
                draft.test_machine.clone(),
                draft.model.clone(),
                draft.purpose.clone(),
                app.date_inputs[0].clone(),
                app.date_inputs[1].clone(),
                image_value,
            ],
        ),
        Draft::Cover(draft) => (
            &COVER_FIELDS[..],
            vec![
                draft.tester_name.clone(),
                line_at(&draft.function, 0),
                line_at(&draft.function, 1),
                line_at(&draft.function, 2),
                line_at(&draft.specifications, 0),
                line_at(&draft.specifications, 1),
                line_at(&draft.specifications, 2),
                image_value,
            ],
        ),
    };

    let lines: Vec<Line> = labels
        .iter()
        .zip(values)
        .enumerate()
        .map(|(index, (label, value))| field_line(label, value, index == app.field))
        .collect();

    let paragraph = Paragraph::new(lines).block(screen_block(app));
    frame.render_widget(paragraph, area);
}

fn field_line(label: &str, value: String, focused: bool) -> Line<'static> {
    let marker = if focused { "> " } else { "  " };
    let value_style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    Line::from(vec![
        Span::raw(marker),
        Span::styled(format!("{:<16}", label), bold()),
        Span::styled(value, value_style),
    ])
}

fn draw_order<B: KvBackend, S: ImageStorage>(frame: &mut Frame, app: &App<B, S>, area: Rect) {
    let Some(Session::Order(editor)) = app.kiosk.session() else {
        return;
    };

    let store = app.kiosk.store();
    let items: Vec<ListItem> = editor
        .rows()
        .into_iter()
        .map(|row| {
            let text = match store.get(row.order) {
                Some(record) => record_line(&record, row.display_number),
                None => format!("{:>2}. ?", row.display_number),
            };
            ListItem::new(text)
        })
        .collect();

    let mut block = screen_block(app);
    if editor.has_changes() {
        block = block.title_bottom(Line::from(" modified ").right_aligned());
    }

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(
        editor
            .selected()
            .and_then(|order| editor.sequence().iter().position(|&o| o == order)),
    );
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_timers<B: KvBackend, S: ImageStorage>(frame: &mut Frame, app: &App<B, S>, area: Rect) {
    let Some(Session::Timers(form)) = app.kiosk.session() else {
        return;
    };

    let labels = ["Slide interval", "Home timeout", "Back timeout"];
    let mut lines: Vec<Line> = TIMER_FIELDS
        .iter()
        .zip(labels)
        .enumerate()
        .map(|(index, (kind, label))| {
            field_line(label, format!("{}s", form.input(*kind)), index == app.field)
        })
        .collect();
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("Each value 1-99 seconds", dim())));

    let paragraph = Paragraph::new(lines).block(screen_block(app));
    frame.render_widget(paragraph, area);
}

// ==================== Status bar and modal ====================

fn draw_status_bar<B: KvBackend, S: ImageStorage>(
    frame: &mut Frame,
    app: &App<B, S>,
    area: Rect,
    now: Instant,
) {
    let content = if let Some(msg) = &app.status_message {
        msg.clone()
    } else if app.kiosk.screen().is_view() && app.kiosk.exit_hint_visible(now) {
        "Press back again to exit".to_string()
    } else {
        key_hints(app.kiosk.screen(), app.on_image_field()).to_string()
    };

    let paragraph = Paragraph::new(content).style(dim());
    frame.render_widget(paragraph, area);
}

fn key_hints(screen: Screen, on_image_field: bool) -> &'static str {
    match screen {
        Screen::View(ViewMode::Slide) => "←/→:slide  v:list view  s:settings  esc:exit",
        Screen::View(ViewMode::List) => "←/→:page  v:slide view  s:settings  esc:exit",
        Screen::Settings => "a:add item  c:add cover  e:edit  d:delete  o:order  t:timers  esc:back",
        Screen::EditItem { .. } | Screen::EditCover { .. } if on_image_field => {
            "type a path, enter:attach  del:remove image  ctrl-s:save  esc:back"
        }
        Screen::EditItem { .. } | Screen::EditCover { .. } => {
            "tab/↑/↓:field  ctrl-s:save  esc:back"
        }
        Screen::EditOrder => "j/k:select  J/K:move  r:revert  enter:apply  esc:back",
        Screen::EditTimer => "tab/↑/↓:field  0-9:edit  enter:save  esc:back",
    }
}

fn draw_modal<B: KvBackend, S: ImageStorage>(frame: &mut Frame, app: &App<B, S>, modal: Modal) {
    let area = frame.area();

    let question = match modal {
        Modal::ConfirmDelete(order) => {
            let title = app
                .kiosk
                .store()
                .get(order)
                .map(|r| r.title().to_string())
                .unwrap_or_default();
            format!("Delete \"{}\"?", truncate(&title, 30))
        }
        Modal::ConfirmLeave => "Discard unsaved changes?".to_string(),
    };

    // Calculate centered popup area
    let popup_width = 44.min(area.width.saturating_sub(4));
    let popup_height = 5.min(area.height.saturating_sub(2));
    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;
    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the popup area
    frame.render_widget(ratatui::widgets::Clear, popup_area);

    let text = vec![
        Line::from(question),
        Line::from(""),
        Line::from(Span::styled("y: yes   any other key: no", dim())),
    ];
    let block = Block::default()
        .title(" Confirm ")
        .borders(Borders::ALL)
        .border_style(bold());
    frame.render_widget(Paragraph::new(text).block(block), popup_area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_line() {
        let mut record = ContentRecord::item("Rig 7");
        record.order = 2;
        let line = record_line(&record, 1);
        assert!(line.starts_with(" 1. Item"));
        assert!(line.contains("Rig 7"));
        assert!(line.trim_end().ends_with('-'));
    }

    #[test]
    fn test_clock_text_uses_twelve_hour_time() {
        let day = chrono::NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();

        let midnight = day.and_hms_opt(0, 5, 9).unwrap();
        assert_eq!(clock_text(midnight), "2024/07/01 (Mon) AM 12:05:09");

        let noon = day.and_hms_opt(12, 0, 0).unwrap();
        assert_eq!(clock_text(noon), "2024/07/01 (Mon) PM 12:00:00");

        let evening = day.and_hms_opt(21, 30, 0).unwrap();
        assert_eq!(clock_text(evening), "2024/07/01 (Mon) PM 09:30:00");
    }

    #[test]
    fn test_key_hints_follow_image_focus() {
        let screen = Screen::EditItem { order: None };
        assert!(key_hints(screen, true).contains("attach"));
        assert!(!key_hints(screen, false).contains("attach"));
    }
}
