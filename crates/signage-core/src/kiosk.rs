//! Kiosk shell
//!
//! Ties the store, image storage, slide rotation and idle timer to the
//! current screen. Every screen change stops both timers, drops the
//! previous screen's editing session and starts whatever the new screen
//! needs. Idle timeouts come back as navigation requests over a channel and
//! are applied on the next [`Kiosk::tick`].

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::forms::{self, FormError, RecordForm, TimerForm};
use crate::idle::{ActivityEvent, ActivityKind, IdleTimeoutController};
use crate::images::{FsImageStorage, ImageCandidate, ImageError, ImagePolicy, ImageStorage};
use crate::models::{ContentRecord, RecordKind, TimerSettings, ViewMode};
use crate::navigation::{ExitDecision, ExitGuard, Screen};
use crate::order::OrderEditor;
use crate::slider::{SlideLayout, SlideRenderer, SlideRotationEngine};
use crate::storage::{FileBackend, KvBackend, StorageResult};
use crate::store::ContentStore;

/// Editing state owned by the current screen
#[derive(Debug)]
pub enum Session {
    Record(RecordForm),
    Order(OrderEditor),
    Timers(TimerForm),
}

impl Session {
    pub fn has_changes(&self) -> bool {
        match self {
            Session::Record(form) => form.should_warn_on_leave(),
            Session::Order(editor) => editor.has_changes(),
            Session::Timers(form) => form.has_changes(),
        }
    }
}

/// The running kiosk
pub struct Kiosk<B: KvBackend, S: ImageStorage> {
    store: ContentStore<B>,
    images: S,
    policy: ImagePolicy,
    list_page_size: usize,
    screen: Screen,
    session: Option<Session>,
    slider: SlideRotationEngine,
    idle: IdleTimeoutController,
    idle_tx: UnboundedSender<Screen>,
    idle_rx: UnboundedReceiver<Screen>,
    countdown: Arc<AtomicU32>,
    exit_guard: ExitGuard,
}

impl Kiosk<FileBackend, FsImageStorage> {
    /// Open the file-backed kiosk described by `config`
    pub fn open(config: Config, now: Instant) -> Result<Self> {
        let policy = ImagePolicy::from_config(&config);
        let page_size = config.list_page_size;
        let images = FsImageStorage::from_config(&config);

        let mut store = ContentStore::open(config).context("Failed to open content store")?;
        if let Some(order) = store
            .migrate_legacy_cover()
            .context("Failed to migrate legacy cover")?
        {
            info!(order, "Moved legacy cover into the slide collection");
        }

        Ok(Self::new(store, images, policy, page_size, now))
    }
}

impl<B: KvBackend, S: ImageStorage> Kiosk<B, S> {
    /// Start on the last visited view
    pub fn new(
        store: ContentStore<B>,
        images: S,
        policy: ImagePolicy,
        list_page_size: usize,
        now: Instant,
    ) -> Self {
        let (idle_tx, idle_rx) = mpsc::unbounded_channel();
        let countdown = Arc::new(AtomicU32::new(0));

        let mut idle = IdleTimeoutController::new();
        let sink = countdown.clone();
        idle.bind_countdown(move |secs| sink.store(secs, Ordering::Relaxed));

        let home = store.load_home_path();
        let mut kiosk = Self {
            store,
            images,
            policy,
            list_page_size,
            screen: Screen::View(home),
            session: None,
            slider: SlideRotationEngine::default(),
            idle,
            idle_tx,
            idle_rx,
            countdown,
            exit_guard: ExitGuard::default(),
        };
        kiosk.navigate(Screen::View(home), now);
        kiosk
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn store(&self) -> &ContentStore<B> {
        &self.store
    }

    pub fn images(&self) -> &S {
        &self.images
    }

    pub fn slider(&self) -> &SlideRotationEngine {
        &self.slider
    }

    /// Receive every slide the rotation shows, on any view
    pub fn set_renderer(&mut self, renderer: Box<dyn SlideRenderer + Send>) {
        self.slider.set_renderer(renderer);
    }

    pub fn idle(&self) -> &IdleTimeoutController {
        &self.idle
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut Session> {
        self.session.as_mut()
    }

    /// Seconds shown on the idle countdown
    pub fn countdown(&self) -> u32 {
        self.countdown.load(Ordering::Relaxed)
    }

    pub fn home(&self) -> ViewMode {
        self.store.load_home_path()
    }

    pub fn timer_settings(&self) -> TimerSettings {
        self.store.load_timer_settings()
    }

    /// Switch screens, returning the screen actually shown
    ///
    /// Unsaved editing state on the old screen is discarded.
    pub fn navigate(&mut self, to: Screen, now: Instant) -> Screen {
        self.idle.stop();
        self.slider.stop();
        self.session = None;

        if let Screen::View(mode) = self.screen {
            if to == Screen::Settings {
                if let Err(e) = self.store.save_home_path(mode) {
                    warn!(error = %e, "failed to save home path");
                }
            }
        }

        let to = self.resolve(to);
        debug!(from = %self.screen, to = %to, "navigate");
        self.screen = to;

        let settings = self.store.load_timer_settings();
        match to {
            Screen::View(mode) => {
                let layout = match mode {
                    ViewMode::Slide => SlideLayout::Slides,
                    ViewMode::List => SlideLayout::List {
                        page_size: self.list_page_size,
                    },
                };
                self.slider.set_layout(layout);
                self.slider.set_duration(settings.slider_timer);
                self.slider.init(&self.store.load(), now);
            }
            Screen::Settings => {}
            Screen::EditItem { order } => self.open_record_form(RecordKind::Item, order),
            Screen::EditCover { order } => self.open_record_form(RecordKind::Cover, order),
            Screen::EditOrder => self.session = Some(Session::Order(OrderEditor::open(&self.store))),
            Screen::EditTimer => {
                let form = TimerForm::open(&mut self.store).unwrap_or_else(|e| {
                    warn!(error = %e, "failed to store effective timer settings");
                    TimerForm::from_settings(settings)
                });
                self.session = Some(Session::Timers(form));
            }
        }

        if let Some(policy) = self.screen.idle_policy(self.store.load_home_path()) {
            let tx = self.idle_tx.clone();
            let target = policy.target;
            self.idle.init(
                move || {
                    if tx.send(target).is_err() {
                        warn!("idle timeout dropped, kiosk is gone");
                    }
                },
                settings.get(policy.timer),
            );
            self.idle.start(&[self.screen.activity_target()], now);
        }

        self.screen
    }

    /// Apply redirects for screens that cannot be shown as requested
    fn resolve(&self, to: Screen) -> Screen {
        match to {
            Screen::View(ViewMode::List) if self.store.count(RecordKind::Item) == 0 => {
                Screen::View(ViewMode::Slide)
            }
            Screen::EditItem { order: Some(order) } | Screen::EditCover { order: Some(order) }
                if self.store.get(order).is_none() =>
            {
                Screen::Settings
            }
            Screen::EditItem { order: None } if !self.store.can_add(RecordKind::Item) => {
                Screen::Settings
            }
            Screen::EditCover { order: None } if !self.store.can_add(RecordKind::Cover) => {
                Screen::Settings
            }
            other => other,
        }
    }

    fn open_record_form(&mut self, kind: RecordKind, order: Option<u32>) {
        let form = match order {
            Some(order) => RecordForm::edit(&self.store, &self.images, self.policy, order),
            None => Some(RecordForm::new(kind, &self.images, self.policy)),
        };
        self.session = form.map(Session::Record);
    }

    /// Feed the clock; returns whether anything visible changed
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut changed = self.slider.tick(now);
        let before = self.countdown();
        self.idle.tick(now);
        changed |= before != self.countdown();

        while let Ok(target) = self.idle_rx.try_recv() {
            info!(from = %self.screen, to = %target, "idle timeout");
            self.navigate(target, now);
            changed = true;
        }
        changed
    }

    /// Report user input on the current screen
    pub fn activity(&mut self, kind: ActivityKind, now: Instant) {
        let event = ActivityEvent::new(self.screen.activity_target(), kind);
        self.idle.activity(&event, now);
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.session.as_ref().is_some_and(Session::has_changes)
    }

    /// User-initiated back
    ///
    /// With unsaved changes `confirm` decides whether to go; returns the
    /// new screen, or `None` when staying put.
    pub fn leave<F>(&mut self, confirm: F, now: Instant) -> Option<Screen>
    where
        F: FnOnce() -> bool,
    {
        let parent = self.screen.parent(self.store.load_home_path())?;
        if self.has_unsaved_changes() && !confirm() {
            return None;
        }
        Some(self.navigate(parent, now))
    }

    /// Back press on a public view
    pub fn press_back(&mut self, now: Instant) -> ExitDecision {
        self.exit_guard.press(now)
    }

    pub fn exit_hint_visible(&self, now: Instant) -> bool {
        self.exit_guard.is_armed(now)
    }

    // ==================== Views ====================

    pub fn next_slide(&mut self, now: Instant) {
        if !self.screen.is_view() || !self.slider.can_navigate() {
            return;
        }
        self.slider.next();
        self.slider.reset_timer(now);
    }

    pub fn previous_slide(&mut self, now: Instant) {
        if !self.screen.is_view() || !self.slider.can_navigate() {
            return;
        }
        self.slider.previous();
        self.slider.reset_timer(now);
    }

    /// Flip between slide and list view
    pub fn toggle_view(&mut self, now: Instant) -> Screen {
        match self.screen {
            Screen::View(mode) if self.slider.can_switch_view() => {
                self.navigate(Screen::View(mode.toggled()), now)
            }
            _ => self.screen,
        }
    }

    // ==================== Settings ====================

    pub fn delete_record(&mut self, order: u32) -> StorageResult<Option<ContentRecord>> {
        forms::delete_record(&mut self.store, &mut self.images, order)
    }

    // ==================== Editors ====================

    pub fn select_image(&mut self, candidate: ImageCandidate) -> Result<(), ImageError> {
        if let Some(Session::Record(form)) = self.session.as_mut() {
            form.image_mut().select(&self.images, candidate)?;
        }
        Ok(())
    }

    pub fn clear_image(&mut self) {
        if let Some(Session::Record(form)) = self.session.as_mut() {
            form.image_mut().clear(&mut self.images);
        }
    }

    /// Save the current editor and return to settings
    pub fn submit(&mut self, now: Instant) -> Result<(), FormError> {
        match self.session.as_mut() {
            Some(Session::Record(form)) => {
                form.submit(&mut self.store, &mut self.images)?;
            }
            Some(Session::Timers(form)) => {
                form.submit(&mut self.store)?;
            }
            Some(Session::Order(editor)) => {
                editor.commit(&mut self.store)?;
                // The order editor stays open after applying
                return Ok(());
            }
            None => return Ok(()),
        }
        self.navigate(Screen::Settings, now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::{Draft, ItemDraft};
    use crate::idle::DEFAULT_IDLE_SECS;
    use crate::images::MemoryImageStorage;
    use crate::models::TimerSettingsPatch;
    use crate::storage::MemoryBackend;
    use std::time::Duration;
    use tempfile::TempDir;

    type TestKiosk = Kiosk<MemoryBackend, MemoryImageStorage>;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn kiosk_with(store: ContentStore<MemoryBackend>, t0: Instant) -> TestKiosk {
        Kiosk::new(
            store,
            MemoryImageStorage::new(),
            ImagePolicy::default(),
            5,
            t0,
        )
    }

    fn store_with_items(n: usize) -> ContentStore<MemoryBackend> {
        let mut store = ContentStore::in_memory();
        for i in 0..n {
            store
                .add_record(ContentRecord::item(format!("M{}", i + 1)))
                .unwrap();
        }
        store
    }

    #[test]
    fn test_starts_on_slides_without_idle_timer() {
        let t0 = Instant::now();
        let kiosk = kiosk_with(store_with_items(2), t0);

        assert_eq!(kiosk.screen(), Screen::View(ViewMode::Slide));
        assert!(kiosk.slider().is_running());
        assert_eq!(kiosk.idle().state(), crate::idle::IdleState::Stopped);
    }

    #[test]
    fn test_list_view_redirects_without_items() {
        let t0 = Instant::now();
        let mut store = ContentStore::in_memory();
        store.add_record(ContentRecord::cover("Lab")).unwrap();
        let mut kiosk = kiosk_with(store, t0);

        assert_eq!(
            kiosk.navigate(Screen::View(ViewMode::List), t0),
            Screen::View(ViewMode::Slide)
        );
    }

    #[test]
    fn test_settings_idles_back_to_home_view() {
        let t0 = Instant::now();
        let mut kiosk = kiosk_with(store_with_items(2), t0);

        kiosk.navigate(Screen::View(ViewMode::List), t0);
        kiosk.navigate(Screen::Settings, t0);
        assert_eq!(kiosk.home(), ViewMode::List);
        assert_eq!(kiosk.countdown(), DEFAULT_IDLE_SECS);

        assert!(kiosk.tick(t0 + secs(89)));
        assert_eq!(kiosk.screen(), Screen::Settings);
        assert_eq!(kiosk.countdown(), 1);

        kiosk.tick(t0 + secs(90));
        assert_eq!(kiosk.screen(), Screen::View(ViewMode::List));
    }

    #[test]
    fn test_editor_idles_back_to_settings_and_discards() {
        let t0 = Instant::now();
        let mut store = store_with_items(1);
        store
            .save_timer_settings(&TimerSettingsPatch {
                back_timer: Some(10),
                ..TimerSettingsPatch::default()
            })
            .unwrap();
        let mut kiosk = kiosk_with(store, t0);

        kiosk.navigate(Screen::EditItem { order: Some(1) }, t0);
        if let Some(Session::Record(form)) = kiosk.session_mut() {
            *form.draft_mut() = Draft::Item(ItemDraft {
                test_machine: "Changed".to_string(),
                ..ItemDraft::default()
            });
        }
        assert!(kiosk.has_unsaved_changes());

        // Activity keeps it alive
        kiosk.activity(ActivityKind::KeyDown, t0 + secs(8));
        kiosk.tick(t0 + secs(12));
        assert!(kiosk.screen().is_editor());

        kiosk.tick(t0 + secs(18));
        assert_eq!(kiosk.screen(), Screen::Settings);
        assert!(kiosk.session().is_none());
        assert_eq!(kiosk.store().get(1).unwrap().title(), "M1");
    }

    #[test]
    fn test_list_view_idles_to_slides() {
        let t0 = Instant::now();
        let mut kiosk = kiosk_with(store_with_items(1), t0);

        kiosk.navigate(Screen::View(ViewMode::List), t0);
        kiosk.tick(t0 + secs(u64::from(DEFAULT_IDLE_SECS)));
        assert_eq!(kiosk.screen(), Screen::View(ViewMode::Slide));
    }

    #[test]
    fn test_leave_prompts_only_with_changes() {
        let t0 = Instant::now();
        let mut kiosk = kiosk_with(store_with_items(2), t0);

        kiosk.navigate(Screen::EditOrder, t0);
        assert_eq!(
            kiosk.leave(|| panic!("no prompt expected"), t0),
            Some(Screen::Settings)
        );

        kiosk.navigate(Screen::EditOrder, t0);
        if let Some(Session::Order(editor)) = kiosk.session_mut() {
            editor.select(Some(1));
            editor.move_up();
        }
        assert_eq!(kiosk.leave(|| false, t0), None);
        assert_eq!(kiosk.screen(), Screen::EditOrder);
        assert_eq!(kiosk.leave(|| true, t0), Some(Screen::Settings));
    }

    #[test]
    fn test_leave_from_view_is_none() {
        let t0 = Instant::now();
        let mut kiosk = kiosk_with(store_with_items(1), t0);
        assert_eq!(kiosk.leave(|| true, t0), None);
    }

    #[test]
    fn test_submit_timer_form_returns_to_settings() {
        let t0 = Instant::now();
        let mut kiosk = kiosk_with(store_with_items(2), t0);

        kiosk.navigate(Screen::EditTimer, t0);
        if let Some(Session::Timers(form)) = kiosk.session_mut() {
            form.set_input(crate::models::TimerKind::Slider, "9");
        }
        kiosk.submit(t0).unwrap();

        assert_eq!(kiosk.screen(), Screen::Settings);
        assert_eq!(kiosk.timer_settings().slider_timer, 9);

        kiosk.navigate(Screen::View(ViewMode::Slide), t0);
        assert_eq!(kiosk.slider().duration(), secs(9));
    }

    #[test]
    fn test_order_commit_stays_on_editor() {
        let t0 = Instant::now();
        let mut kiosk = kiosk_with(store_with_items(2), t0);

        kiosk.navigate(Screen::EditOrder, t0);
        if let Some(Session::Order(editor)) = kiosk.session_mut() {
            editor.select(Some(1));
            editor.move_up();
        }
        kiosk.submit(t0).unwrap();

        assert_eq!(kiosk.screen(), Screen::EditOrder);
        assert!(!kiosk.has_unsaved_changes());
        assert_eq!(kiosk.store().get(2).unwrap().title(), "M1");
    }

    #[test]
    fn test_new_item_when_full_goes_to_settings() {
        let t0 = Instant::now();
        let mut kiosk = kiosk_with(store_with_items(10), t0);

        assert_eq!(
            kiosk.navigate(Screen::EditItem { order: None }, t0),
            Screen::Settings
        );
        assert_eq!(
            kiosk.navigate(Screen::EditCover { order: None }, t0),
            Screen::EditCover { order: None }
        );
    }

    #[test]
    fn test_manual_navigation_resets_rotation() {
        let t0 = Instant::now();
        let mut kiosk = kiosk_with(store_with_items(3), t0);

        kiosk.next_slide(t0 + secs(4));
        assert_eq!(kiosk.slider().current_index(), 1);
        assert!(!kiosk.tick(t0 + secs(5)));
        assert!(kiosk.tick(t0 + secs(9)));
        assert_eq!(kiosk.slider().current_index(), 2);
    }

    #[test]
    fn test_empty_kiosk_cannot_toggle() {
        let t0 = Instant::now();
        let mut kiosk = kiosk_with(ContentStore::in_memory(), t0);

        assert!(kiosk.slider().is_empty());
        assert_eq!(kiosk.toggle_view(t0), Screen::View(ViewMode::Slide));
    }

    #[test]
    fn test_delete_record_reinits_on_return() {
        let t0 = Instant::now();
        let mut kiosk = kiosk_with(store_with_items(2), t0);

        kiosk.navigate(Screen::Settings, t0);
        kiosk.delete_record(1).unwrap();
        kiosk.navigate(Screen::View(ViewMode::Slide), t0);
        assert_eq!(kiosk.slider().len(), 1);
    }

    #[test]
    fn test_renderer_follows_navigation() {
        use crate::slider::{Slide, SlideCounter, SlideText};
        use std::sync::Mutex;

        struct Recorder(Arc<Mutex<Vec<String>>>);

        impl SlideRenderer for Recorder {
            fn render(&mut self, slide: &Slide, _counter: SlideCounter) {
                self.0.lock().unwrap().push(SlideText::from(slide).title);
            }
        }

        let t0 = Instant::now();
        let mut kiosk = kiosk_with(store_with_items(2), t0);
        let seen = Arc::new(Mutex::new(Vec::new()));
        kiosk.set_renderer(Box::new(Recorder(seen.clone())));

        kiosk.next_slide(t0);
        kiosk.navigate(Screen::View(ViewMode::List), t0);
        assert_eq!(*seen.lock().unwrap(), vec!["M2", "Equipment (1/1)"]);
    }

    #[test]
    fn test_open_file_backed_kiosk() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::with_data_dir(temp_dir.path());
        std::fs::write(
            config.key_path("coverData"),
            r#"{"testerName":"Legacy"}"#,
        )
        .unwrap();

        let t0 = Instant::now();
        let kiosk = Kiosk::open(config, t0).unwrap();
        assert_eq!(kiosk.store().get(1).unwrap().title(), "Legacy");
        assert_eq!(kiosk.slider().len(), 1);
    }
}
