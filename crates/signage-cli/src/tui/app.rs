//! Application state and key handling

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use crossterm::event::{KeyCode, KeyModifiers};

use signage_core::forms::{parse_date, Draft};
use signage_core::images::ImageStorage;
use signage_core::models::TimerKind;
use signage_core::storage::KvBackend;
use signage_core::{
    ActivityKind, ContentRecord, ExitDecision, FormError, ImageCandidate, Kiosk, OrderEditor,
    RecordKind, Screen, Session,
};

/// How long a status message stays in the status bar
const STATUS_TIMEOUT: Duration = Duration::from_secs(3);

/// Timer inputs, top to bottom
pub const TIMER_FIELDS: [TimerKind; 3] = [TimerKind::Slider, TimerKind::Home, TimerKind::Back];

/// Field labels of the item form; the image picker is always last
pub const ITEM_FIELDS: [&str; 6] = [
    "Test machine",
    "Model",
    "Purpose",
    "Start date",
    "End date",
    "Image",
];

pub const COVER_FIELDS: [&str; 8] = [
    "Tester name",
    "Function 1",
    "Function 2",
    "Function 3",
    "Specification 1",
    "Specification 2",
    "Specification 3",
    "Image",
];

/// A question waiting for y/n
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modal {
    ConfirmDelete(u32),
    ConfirmLeave,
}

/// Main application state
pub struct App<B: KvBackend, S: ImageStorage> {
    pub kiosk: Kiosk<B, S>,

    /// Should the application quit?
    pub should_quit: bool,

    /// Status message to display
    pub status_message: Option<String>,

    /// When the status message was set (for auto-dismiss)
    pub status_message_time: Option<Instant>,

    pub modal: Option<Modal>,

    /// Records on the settings screen, most recent first
    pub records: Vec<ContentRecord>,

    /// Selected row on the settings screen
    pub selected: usize,

    /// Focused input on an editing screen
    pub field: usize,

    /// Start and end date as typed
    pub date_inputs: [String; 2],

    /// Image path as typed
    pub image_input: String,

    /// Screen the UI state above belongs to
    screen: Screen,
}

impl<B: KvBackend, S: ImageStorage> App<B, S> {
    pub fn new(kiosk: Kiosk<B, S>) -> Self {
        let mut app = Self {
            screen: kiosk.screen(),
            kiosk,
            should_quit: false,
            status_message: None,
            status_message_time: None,
            modal: None,
            records: Vec::new(),
            selected: 0,
            field: 0,
            date_inputs: Default::default(),
            image_input: String::new(),
        };
        app.reset_screen_state();
        app
    }

    /// Set a status message (will auto-dismiss after 3 seconds)
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.status_message_time = Some(Instant::now());
    }

    /// Check and clear expired status message
    pub fn check_status_timeout(&mut self) {
        if let Some(time) = self.status_message_time {
            if time.elapsed() > STATUS_TIMEOUT {
                self.status_message = None;
                self.status_message_time = None;
            }
        }
    }

    /// Feed the clock to the kiosk
    pub fn tick(&mut self, now: Instant) {
        self.kiosk.tick(now);
        self.sync_screen();
    }

    /// Mouse movement or click anywhere on the screen
    pub fn pointer(&mut self, kind: ActivityKind, now: Instant) {
        self.kiosk.activity(kind, now);
    }

    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers, now: Instant) {
        self.kiosk.activity(ActivityKind::KeyDown, now);

        if code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        // A pending question takes the next key
        if let Some(modal) = self.modal.take() {
            if matches!(code, KeyCode::Char('y') | KeyCode::Char('Y')) {
                self.confirm(modal, now);
            }
            self.sync_screen();
            return;
        }

        match self.kiosk.screen() {
            Screen::View(_) => self.handle_view_key(code, now),
            Screen::Settings => self.handle_settings_key(code, now),
            Screen::EditItem { .. } | Screen::EditCover { .. } => {
                self.handle_record_key(code, modifiers, now)
            }
            Screen::EditOrder => self.handle_order_key(code, modifiers, now),
            Screen::EditTimer => self.handle_timer_key(code, modifiers, now),
        }
        self.sync_screen();
    }

    /// Reset per-screen state after the kiosk moved to another screen
    fn sync_screen(&mut self) {
        if self.kiosk.screen() != self.screen {
            self.screen = self.kiosk.screen();
            self.reset_screen_state();
        }
    }

    fn reset_screen_state(&mut self) {
        self.modal = None;
        self.field = 0;
        self.image_input.clear();
        self.date_inputs = Default::default();
        self.refresh_records();

        match self.kiosk.session_mut() {
            Some(Session::Record(form)) => {
                if let Draft::Item(draft) = form.draft() {
                    let text = |d: Option<NaiveDate>| {
                        d.map(|d| d.format("%Y-%m-%d").to_string())
                            .unwrap_or_default()
                    };
                    self.date_inputs = [text(draft.start_date), text(draft.end_date)];
                }
            }
            Some(Session::Order(editor)) => {
                let first = editor.sequence().first().copied();
                editor.select(first);
            }
            _ => {}
        }
    }

    fn refresh_records(&mut self) {
        self.records = self.kiosk.store().records_descending();
        self.selected = self.selected.min(self.records.len().saturating_sub(1));
    }

    fn confirm(&mut self, modal: Modal, now: Instant) {
        match modal {
            Modal::ConfirmDelete(order) => {
                match self.kiosk.delete_record(order) {
                    Ok(Some(record)) => {
                        self.set_status(format!("Deleted {}: {}", record.kind, record.title()))
                    }
                    Ok(None) => self.set_status(format!("Slide not found: {}", order)),
                    Err(e) => self.set_status(format!("Delete failed: {}", e)),
                }
                self.refresh_records();
            }
            Modal::ConfirmLeave => {
                self.kiosk.leave(|| true, now);
            }
        }
    }

    /// Back out of the current screen, asking first if work would be lost
    fn leave(&mut self, now: Instant) {
        if self.kiosk.has_unsaved_changes() {
            self.modal = Some(Modal::ConfirmLeave);
        } else {
            self.kiosk.leave(|| true, now);
        }
    }

    fn submit(&mut self, now: Instant) {
        if matches!(self.kiosk.session(), Some(Session::Record(_))) {
            let invalid = self
                .date_inputs
                .iter()
                .find_map(|input| parse_date(input).err());
            if let Some(e) = invalid {
                self.set_status(e.to_string());
                return;
            }
        }
        match self.kiosk.submit(now) {
            Ok(()) => self.set_status("Saved"),
            Err(FormError::Storage(e)) if e.is_recoverable() => {
                let hint = e.recovery_suggestion().unwrap_or_default();
                self.set_status(format!("{} {}", e, hint));
            }
            Err(e) => self.set_status(e.to_string()),
        }
    }

    // ==================== Views ====================

    fn handle_view_key(&mut self, code: KeyCode, now: Instant) {
        match code {
            KeyCode::Right | KeyCode::Char('l') | KeyCode::Char(' ') => self.kiosk.next_slide(now),
            KeyCode::Left | KeyCode::Char('h') => self.kiosk.previous_slide(now),
            KeyCode::Char('v') => {
                self.kiosk.toggle_view(now);
            }
            KeyCode::Char('s') => {
                self.kiosk.navigate(Screen::Settings, now);
            }
            KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('q') => {
                if self.kiosk.press_back(now) == ExitDecision::Exit {
                    self.should_quit = true;
                }
            }
            _ => {}
        }
    }

    // ==================== Settings ====================

    fn handle_settings_key(&mut self, code: KeyCode, now: Instant) {
        match code {
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < self.records.len() {
                    self.selected += 1;
                }
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
            }
            KeyCode::Char('a') => self.open_new(RecordKind::Item, now),
            KeyCode::Char('c') => self.open_new(RecordKind::Cover, now),
            KeyCode::Enter | KeyCode::Char('e') => {
                if let Some(record) = self.records.get(self.selected) {
                    let order = Some(record.order);
                    let to = match record.kind {
                        RecordKind::Item => Screen::EditItem { order },
                        RecordKind::Cover => Screen::EditCover { order },
                    };
                    self.kiosk.navigate(to, now);
                }
            }
            KeyCode::Char('d') => {
                if let Some(record) = self.records.get(self.selected) {
                    self.modal = Some(Modal::ConfirmDelete(record.order));
                }
            }
            KeyCode::Char('o') => {
                if self.records.is_empty() {
                    self.set_status("Nothing to reorder");
                } else {
                    self.kiosk.navigate(Screen::EditOrder, now);
                }
            }
            KeyCode::Char('t') => {
                self.kiosk.navigate(Screen::EditTimer, now);
            }
            KeyCode::Esc | KeyCode::Char('q') => self.leave(now),
            _ => {}
        }
    }

    fn open_new(&mut self, kind: RecordKind, now: Instant) {
        let to = match kind {
            RecordKind::Item => Screen::EditItem { order: None },
            RecordKind::Cover => Screen::EditCover { order: None },
        };
        if self.kiosk.navigate(to, now) != to {
            self.set_status(format!("{} limit reached ({})", kind, kind.cap()));
        }
    }

    // ==================== Record editor ====================

    /// Number of inputs on the current record form
    pub fn record_field_count(&self) -> usize {
        match self.kiosk.screen() {
            Screen::EditCover { .. } => COVER_FIELDS.len(),
            _ => ITEM_FIELDS.len(),
        }
    }

    pub fn on_image_field(&self) -> bool {
        self.field + 1 == self.record_field_count()
    }

    fn handle_record_key(&mut self, code: KeyCode, modifiers: KeyModifiers, now: Instant) {
        let count = self.record_field_count();
        match code {
            KeyCode::Char('s') if modifiers.contains(KeyModifiers::CONTROL) => self.submit(now),
            KeyCode::Esc => self.leave(now),
            KeyCode::Tab | KeyCode::Down => self.field = (self.field + 1) % count,
            KeyCode::BackTab | KeyCode::Up => self.field = (self.field + count - 1) % count,
            KeyCode::Delete if self.on_image_field() => {
                self.kiosk.clear_image();
                self.image_input.clear();
                self.set_status("Image removed");
            }
            KeyCode::Enter if self.on_image_field() => self.attach_image(),
            KeyCode::Enter => self.field = (self.field + 1) % count,
            KeyCode::Backspace => self.edit_field(|s| {
                s.pop();
            }),
            KeyCode::Char(c) if !modifiers.contains(KeyModifiers::CONTROL) => {
                self.edit_field(|s| s.push(c))
            }
            _ => {}
        }
    }

    fn edit_field(&mut self, edit: impl FnOnce(&mut String)) {
        if self.on_image_field() {
            edit(&mut self.image_input);
            return;
        }

        let field = self.field;
        let Some(Session::Record(form)) = self.kiosk.session_mut() else {
            return;
        };
        match form.draft_mut() {
            Draft::Item(draft) => match field {
                0 => edit(&mut draft.test_machine),
                1 => edit(&mut draft.model),
                2 => edit(&mut draft.purpose),
                3 | 4 => {
                    let input = &mut self.date_inputs[field - 3];
                    edit(input);
                    // Half-typed dates stay as text until they parse
                    if let Ok(date) = parse_date(input) {
                        if field == 3 {
                            draft.start_date = date;
                        } else {
                            draft.end_date = date;
                        }
                    }
                }
                _ => {}
            },
            Draft::Cover(draft) => match field {
                0 => edit(&mut draft.tester_name),
                1..=3 => edit(line_mut(&mut draft.function, field - 1)),
                4..=6 => edit(line_mut(&mut draft.specifications, field - 4)),
                _ => {}
            },
        }
    }

    fn attach_image(&mut self) {
        let path = PathBuf::from(self.image_input.trim());
        if path.as_os_str().is_empty() {
            return;
        }
        let Some(Session::Record(form)) = self.kiosk.session() else {
            return;
        };
        let policy = *form.image().policy();

        let result = ImageCandidate::from_path(&path, &policy)
            .and_then(|candidate| self.kiosk.select_image(candidate));
        match result {
            Ok(()) => {
                self.image_input.clear();
                self.set_status("Image selected");
            }
            Err(e) => self.set_status(e.to_string()),
        }
    }

    // ==================== Order editor ====================

    fn handle_order_key(&mut self, code: KeyCode, modifiers: KeyModifiers, now: Instant) {
        let ctrl = modifiers.contains(KeyModifiers::CONTROL);
        let shift = modifiers.contains(KeyModifiers::SHIFT);
        match code {
            KeyCode::Char('s') if ctrl => return self.submit(now),
            KeyCode::Enter => return self.submit(now),
            KeyCode::Esc => return self.leave(now),
            _ => {}
        }

        let Some(Session::Order(editor)) = self.kiosk.session_mut() else {
            return;
        };
        match code {
            KeyCode::Up if shift => {
                editor.move_up();
            }
            KeyCode::Down if shift => {
                editor.move_down();
            }
            KeyCode::Char('K') => {
                editor.move_up();
            }
            KeyCode::Char('J') => {
                editor.move_down();
            }
            KeyCode::Down | KeyCode::Char('j') => select_offset(editor, 1),
            KeyCode::Up | KeyCode::Char('k') => select_offset(editor, -1),
            KeyCode::Char('r') => editor.revert(),
            _ => {}
        }
    }

    // ==================== Timer editor ====================

    fn handle_timer_key(&mut self, code: KeyCode, modifiers: KeyModifiers, now: Instant) {
        let count = TIMER_FIELDS.len();
        match code {
            KeyCode::Char('s') if modifiers.contains(KeyModifiers::CONTROL) => {
                return self.submit(now)
            }
            KeyCode::Enter => return self.submit(now),
            KeyCode::Esc => return self.leave(now),
            KeyCode::Tab | KeyCode::Down => {
                self.field = (self.field + 1) % count;
                return;
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.field = (self.field + count - 1) % count;
                return;
            }
            _ => {}
        }

        let kind = TIMER_FIELDS[self.field % count];
        let Some(Session::Timers(form)) = self.kiosk.session_mut() else {
            return;
        };
        let mut value = form.input(kind).to_string();
        match code {
            KeyCode::Backspace => {
                value.pop();
            }
            KeyCode::Char(c) => value.push(c),
            _ => return,
        }
        form.set_input(kind, &value);
    }
}

fn line_mut(lines: &mut Vec<String>, index: usize) -> &mut String {
    if lines.len() <= index {
        lines.resize(index + 1, String::new());
    }
    &mut lines[index]
}

fn select_offset(editor: &mut OrderEditor, delta: isize) {
    let sequence = editor.sequence();
    if sequence.is_empty() {
        return;
    }
    let current = editor
        .selected()
        .and_then(|order| sequence.iter().position(|&o| o == order))
        .unwrap_or(0);
    let next = current
        .saturating_add_signed(delta)
        .min(sequence.len() - 1);
    let order = sequence[next];
    editor.select(Some(order));
}

#[cfg(test)]
mod tests {
    use super::*;
    use signage_core::images::MemoryImageStorage;
    use signage_core::storage::MemoryBackend;
    use signage_core::{ContentStore, ImagePolicy, ViewMode};

    type TestApp = App<MemoryBackend, MemoryImageStorage>;

    fn app_with(titles: &[&str], t0: Instant) -> TestApp {
        let mut store = ContentStore::in_memory();
        for title in titles {
            store.add_record(ContentRecord::item(*title)).unwrap();
        }
        let kiosk = Kiosk::new(
            store,
            MemoryImageStorage::new(),
            ImagePolicy::default(),
            5,
            t0,
        );
        App::new(kiosk)
    }

    fn press(app: &mut TestApp, code: KeyCode, now: Instant) {
        app.handle_key(code, KeyModifiers::NONE, now);
    }

    fn type_text(app: &mut TestApp, text: &str, now: Instant) {
        for c in text.chars() {
            press(app, KeyCode::Char(c), now);
        }
    }

    fn save(app: &mut TestApp, now: Instant) {
        app.handle_key(KeyCode::Char('s'), KeyModifiers::CONTROL, now);
    }

    #[test]
    fn test_double_back_quits() {
        let t0 = Instant::now();
        let mut app = app_with(&["A"], t0);

        press(&mut app, KeyCode::Esc, t0);
        assert!(!app.should_quit);
        press(&mut app, KeyCode::Esc, t0 + Duration::from_millis(500));
        assert!(app.should_quit);
    }

    #[test]
    fn test_add_item_from_settings() {
        let t0 = Instant::now();
        let mut app = app_with(&[], t0);

        press(&mut app, KeyCode::Char('s'), t0);
        assert_eq!(app.kiosk.screen(), Screen::Settings);
        press(&mut app, KeyCode::Char('a'), t0);
        assert_eq!(app.kiosk.screen(), Screen::EditItem { order: None });

        type_text(&mut app, "Rig 7", t0);
        press(&mut app, KeyCode::Tab, t0);
        press(&mut app, KeyCode::Tab, t0);
        press(&mut app, KeyCode::Tab, t0);
        type_text(&mut app, "2024-03-01", t0);
        save(&mut app, t0);

        assert_eq!(app.kiosk.screen(), Screen::Settings);
        assert_eq!(app.records.len(), 1);
        let record = &app.records[0];
        assert_eq!(record.title(), "Rig 7");
        assert!(record.start_date.is_some());
    }

    #[test]
    fn test_half_typed_date_blocks_save() {
        let t0 = Instant::now();
        let mut app = app_with(&[], t0);

        app.kiosk.navigate(Screen::EditItem { order: None }, t0);
        app.tick(t0);
        type_text(&mut app, "Rig", t0);
        app.field = 3;
        type_text(&mut app, "2024-13", t0);
        save(&mut app, t0);

        assert!(app.kiosk.screen().is_editor());
        assert!(app.status_message.is_some());
        assert!(app.kiosk.store().load().is_empty());
    }

    #[test]
    fn test_leave_with_changes_asks_first() {
        let t0 = Instant::now();
        let mut app = app_with(&["A"], t0);

        app.kiosk.navigate(Screen::EditItem { order: Some(1) }, t0);
        app.tick(t0);
        type_text(&mut app, "x", t0);

        press(&mut app, KeyCode::Esc, t0);
        assert_eq!(app.modal, Some(Modal::ConfirmLeave));
        press(&mut app, KeyCode::Char('n'), t0);
        assert_eq!(app.modal, None);
        assert!(app.kiosk.screen().is_editor());

        press(&mut app, KeyCode::Esc, t0);
        press(&mut app, KeyCode::Char('y'), t0);
        assert_eq!(app.kiosk.screen(), Screen::Settings);
        assert_eq!(app.kiosk.store().get(1).unwrap().title(), "A");
    }

    #[test]
    fn test_delete_after_confirm() {
        let t0 = Instant::now();
        let mut app = app_with(&["A", "B"], t0);

        press(&mut app, KeyCode::Char('s'), t0);
        // Top row is the most recent record
        press(&mut app, KeyCode::Char('d'), t0);
        assert_eq!(app.modal, Some(Modal::ConfirmDelete(2)));
        press(&mut app, KeyCode::Char('y'), t0);

        assert_eq!(app.records.len(), 1);
        assert_eq!(app.records[0].title(), "A");
    }

    #[test]
    fn test_cover_lines() {
        let t0 = Instant::now();
        let mut app = app_with(&[], t0);

        app.kiosk.navigate(Screen::EditCover { order: None }, t0);
        app.tick(t0);
        type_text(&mut app, "Lab", t0);
        app.field = 2;
        type_text(&mut app, "Fatigue", t0);
        save(&mut app, t0);

        let record = app.kiosk.store().get(1).unwrap();
        assert_eq!(record.function, vec!["", "Fatigue", ""]);
    }

    #[test]
    fn test_new_item_at_limit_reports() {
        let t0 = Instant::now();
        let titles: Vec<String> = (1..=10).map(|i| format!("M{}", i)).collect();
        let refs: Vec<&str> = titles.iter().map(String::as_str).collect();
        let mut app = app_with(&refs, t0);

        press(&mut app, KeyCode::Char('s'), t0);
        press(&mut app, KeyCode::Char('a'), t0);
        assert_eq!(app.kiosk.screen(), Screen::Settings);
        assert_eq!(app.status_message.as_deref(), Some("Item limit reached (10)"));
    }

    #[test]
    fn test_order_editor_moves_and_applies() {
        let t0 = Instant::now();
        let mut app = app_with(&["A", "B", "C"], t0);

        press(&mut app, KeyCode::Char('s'), t0);
        press(&mut app, KeyCode::Char('o'), t0);
        assert_eq!(app.kiosk.screen(), Screen::EditOrder);

        // Top row (C) is selected; move it down one
        press(&mut app, KeyCode::Char('J'), t0);
        assert!(app.kiosk.has_unsaved_changes());
        press(&mut app, KeyCode::Enter, t0);

        assert_eq!(app.kiosk.screen(), Screen::EditOrder);
        let top_down: Vec<String> = app
            .kiosk
            .store()
            .records_descending()
            .iter()
            .map(|r| r.title().to_string())
            .collect();
        assert_eq!(top_down, vec!["B", "C", "A"]);
    }

    #[test]
    fn test_timer_input_keeps_digits() {
        let t0 = Instant::now();
        let mut app = app_with(&["A"], t0);

        app.kiosk.navigate(Screen::EditTimer, t0);
        app.tick(t0);
        press(&mut app, KeyCode::Backspace, t0);
        type_text(&mut app, "x8", t0);
        press(&mut app, KeyCode::Enter, t0);

        assert_eq!(app.kiosk.screen(), Screen::Settings);
        assert_eq!(app.kiosk.timer_settings().slider_timer, 8);
    }

    #[test]
    fn test_idle_timeout_closes_modal() {
        let t0 = Instant::now();
        let mut app = app_with(&["A"], t0);

        press(&mut app, KeyCode::Char('s'), t0);
        press(&mut app, KeyCode::Char('d'), t0);
        assert!(app.modal.is_some());

        app.tick(t0 + Duration::from_secs(90));
        assert_eq!(app.kiosk.screen(), Screen::View(ViewMode::Slide));
        assert_eq!(app.modal, None);
        assert_eq!(app.kiosk.store().load().len(), 1);
    }
}
