//! Slide rotation
//!
//! Builds the slide sequence from the record collection and advances it on a
//! fixed interval. The engine never reads the clock itself: callers feed it
//! `Instant`s through [`SlideRotationEngine::tick`], so a test can drive it
//! with a fake clock and the kiosk loop can drive it from its frame timer.

use std::time::{Duration, Instant};

use chrono::NaiveDate;
use tracing::debug;

use crate::models::{ContentRecord, RecordKind};

/// One displayable slide
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slide {
    Cover(ContentRecord),
    Item(ContentRecord),
    /// A page of the item list, `page` counted from 1
    ListPage {
        page: usize,
        pages: usize,
        records: Vec<ContentRecord>,
    },
}

impl Slide {
    pub fn is_cover(&self) -> bool {
        matches!(self, Slide::Cover(_))
    }
}

/// How records become slides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlideLayout {
    /// Every record is its own slide, by ascending order
    #[default]
    Slides,
    /// Covers as slides, then the items chunked into list pages
    List { page_size: usize },
}

impl SlideLayout {
    pub fn build(self, records: &[ContentRecord]) -> Vec<Slide> {
        let mut sorted: Vec<&ContentRecord> = records.iter().collect();
        sorted.sort_by_key(|r| r.order);

        match self {
            SlideLayout::Slides => sorted
                .into_iter()
                .map(|r| match r.kind {
                    RecordKind::Cover => Slide::Cover(r.clone()),
                    RecordKind::Item => Slide::Item(r.clone()),
                })
                .collect(),
            SlideLayout::List { page_size } => {
                let mut slides: Vec<Slide> = sorted
                    .iter()
                    .filter(|r| r.is_cover())
                    .map(|r| Slide::Cover((*r).clone()))
                    .collect();

                let items: Vec<ContentRecord> = sorted
                    .iter()
                    .filter(|r| r.is_item())
                    .map(|r| (*r).clone())
                    .collect();
                let chunks: Vec<&[ContentRecord]> = items.chunks(page_size.max(1)).collect();
                let pages = chunks.len();
                slides.extend(chunks.into_iter().enumerate().map(|(i, chunk)| {
                    Slide::ListPage {
                        page: i + 1,
                        pages,
                        records: chunk.to_vec(),
                    }
                }));
                slides
            }
        }
    }
}

/// Position shown in the corner of the kiosk, covers excluded
///
/// `current` is 0 while a cover is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlideCounter {
    pub current: usize,
    pub total: usize,
}

impl std::fmt::Display for SlideCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {}", self.current, self.total)
    }
}

/// Receives the slide to show after every change
pub trait SlideRenderer {
    fn render(&mut self, slide: &Slide, counter: SlideCounter);

    /// Nothing to show; the kiosk displays its placeholder
    fn render_empty(&mut self) {}
}

/// Rotates slides at a fixed interval
pub struct SlideRotationEngine {
    slides: Vec<Slide>,
    current: usize,
    next_due: Option<Instant>,
    duration: Duration,
    layout: SlideLayout,
    renderer: Option<Box<dyn SlideRenderer + Send>>,
}

impl std::fmt::Debug for SlideRotationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlideRotationEngine")
            .field("slides", &self.slides.len())
            .field("current", &self.current)
            .field("next_due", &self.next_due)
            .field("duration", &self.duration)
            .field("layout", &self.layout)
            .finish()
    }
}

impl Default for SlideRotationEngine {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl SlideRotationEngine {
    pub fn new(duration: Duration) -> Self {
        Self {
            slides: Vec::new(),
            current: 0,
            next_due: None,
            duration,
            layout: SlideLayout::default(),
            renderer: None,
        }
    }

    pub fn set_renderer(&mut self, renderer: Box<dyn SlideRenderer + Send>) {
        self.renderer = Some(renderer);
    }

    pub fn set_layout(&mut self, layout: SlideLayout) {
        self.layout = layout;
    }

    pub fn layout(&self) -> SlideLayout {
        self.layout
    }

    /// Rotation interval in whole seconds; takes effect at the next reschedule
    pub fn set_duration(&mut self, secs: u32) {
        self.duration = Duration::from_secs(u64::from(secs.max(1)));
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Rebuild from `records` and start rotating from the first slide
    ///
    /// An empty collection leaves the engine in its empty state: nothing to
    /// navigate and no rotation.
    pub fn init(&mut self, records: &[ContentRecord], now: Instant) {
        self.stop();
        self.slides = self.layout.build(records);
        self.current = 0;
        debug!(slides = self.slides.len(), "slider initialized");

        self.render();
        self.start(now);
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    /// Prev / next controls are usable
    pub fn can_navigate(&self) -> bool {
        self.slides.len() > 1
    }

    /// Switching between slide and list view is allowed
    pub fn can_switch_view(&self) -> bool {
        !self.is_empty()
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_slide(&self) -> Option<&Slide> {
        self.slides.get(self.current)
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub fn counter(&self) -> SlideCounter {
        let total = self.slides.iter().filter(|s| !s.is_cover()).count();
        let current = match self.slides.get(self.current) {
            Some(slide) if !slide.is_cover() => self.slides[..=self.current]
                .iter()
                .filter(|s| !s.is_cover())
                .count(),
            _ => 0,
        };
        SlideCounter { current, total }
    }

    pub fn next(&mut self) {
        if self.slides.is_empty() {
            return;
        }
        self.current = (self.current + 1) % self.slides.len();
        self.render();
    }

    pub fn previous(&mut self) {
        if self.slides.is_empty() {
            return;
        }
        let len = self.slides.len();
        self.current = (self.current + len - 1) % len;
        self.render();
    }

    /// Schedule the next automatic advance; needs at least two slides
    pub fn start(&mut self, now: Instant) {
        if self.slides.len() <= 1 {
            self.next_due = None;
            return;
        }
        self.next_due = Some(now + self.duration);
    }

    pub fn stop(&mut self) {
        self.next_due = None;
    }

    /// Restart the interval after manual navigation
    pub fn reset_timer(&mut self, now: Instant) {
        self.stop();
        self.start(now);
    }

    /// Advance if the interval has elapsed; returns whether the slide changed
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(due) if now >= due => {
                self.next();
                self.next_due = Some(now + self.duration);
                true
            }
            _ => false,
        }
    }

    /// Time until the next automatic advance
    pub fn time_until_next(&self, now: Instant) -> Option<Duration> {
        self.next_due.map(|due| due.saturating_duration_since(now))
    }

    fn render(&mut self) {
        let counter = self.counter();
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        match self.slides.get(self.current) {
            Some(slide) => renderer.render(slide, counter),
            None => renderer.render_empty(),
        }
    }
}

/// Text content of a slide, ready to lay out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideText {
    pub title: String,
    pub rows: Vec<(String, String)>,
    pub image_path: Option<String>,
}

impl From<&Slide> for SlideText {
    fn from(slide: &Slide) -> Self {
        match slide {
            Slide::Cover(record) => {
                let mut rows = Vec::new();
                rows.extend(
                    non_empty_lines(&record.function).map(|line| ("Function".to_string(), line)),
                );
                rows.extend(
                    non_empty_lines(&record.specifications)
                        .map(|line| ("Specifications".to_string(), line)),
                );
                SlideText {
                    title: record.title().to_string(),
                    rows,
                    image_path: record.image_path.clone(),
                }
            }
            Slide::Item(record) => SlideText {
                title: record.title().to_string(),
                rows: vec![
                    ("Test machine".to_string(), field(&record.test_machine)),
                    ("Model".to_string(), field(&record.model)),
                    ("Purpose".to_string(), field(&record.purpose)),
                    (
                        "Schedule".to_string(),
                        format_schedule(record.start_date, record.end_date),
                    ),
                ],
                image_path: record.image_path.clone(),
            },
            Slide::ListPage {
                page,
                pages,
                records,
            } => SlideText {
                title: format!("Equipment ({}/{})", page, pages),
                rows: records
                    .iter()
                    .map(|r| {
                        (
                            r.title().to_string(),
                            format!(
                                "{} | {} | {}",
                                field(&r.model),
                                field(&r.purpose),
                                format_schedule(r.start_date, r.end_date)
                            ),
                        )
                    })
                    .collect(),
                image_path: None,
            },
        }
    }
}

fn non_empty_lines(lines: &[String]) -> impl Iterator<Item = String> + '_ {
    lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .map(str::to_string)
}

fn field(value: &Option<String>) -> String {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => "-".to_string(),
    }
}

/// `YY/MM/DD`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%y/%m/%d").to_string()
}

/// `YY/MM/DD ~ YY/MM/DD`, or `-` when neither date is set
pub fn format_schedule(start: Option<NaiveDate>, end: Option<NaiveDate>) -> String {
    if start.is_none() && end.is_none() {
        return "-".to_string();
    }
    let side = |d: Option<NaiveDate>| d.map(format_date).unwrap_or_default();
    format!("{} ~ {}", side(start), side(end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn item(order: u32, name: &str) -> ContentRecord {
        let mut r = ContentRecord::item(name);
        r.order = order;
        r
    }

    fn cover(order: u32, name: &str) -> ContentRecord {
        let mut r = ContentRecord::cover(name);
        r.order = order;
        r
    }

    fn titles(engine: &SlideRotationEngine) -> Vec<String> {
        engine
            .slides()
            .iter()
            .map(|s| SlideText::from(s).title)
            .collect()
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl SlideRenderer for Recorder {
        fn render(&mut self, slide: &Slide, counter: SlideCounter) {
            self.0
                .lock()
                .unwrap()
                .push(format!("{} {}", SlideText::from(slide).title, counter));
        }

        fn render_empty(&mut self) {
            self.0.lock().unwrap().push("empty".to_string());
        }
    }

    #[test]
    fn test_slides_follow_ascending_order() {
        let now = Instant::now();
        let mut engine = SlideRotationEngine::default();
        engine.init(&[item(3, "C"), cover(1, "Lab"), item(2, "B")], now);

        assert_eq!(titles(&engine), vec!["Lab", "B", "C"]);
        assert_eq!(engine.current_index(), 0);
        assert!(engine.is_running());
    }

    #[test]
    fn test_empty_collection() {
        let now = Instant::now();
        let recorder = Recorder::default();
        let mut engine = SlideRotationEngine::default();
        engine.set_renderer(Box::new(recorder.clone()));

        engine.init(&[], now);
        engine.next();
        engine.previous();

        assert!(engine.is_empty());
        assert!(!engine.is_running());
        assert!(!engine.can_navigate());
        assert!(!engine.can_switch_view());
        assert!(!engine.tick(now + Duration::from_secs(60)));
        assert_eq!(*recorder.0.lock().unwrap(), vec!["empty"]);
    }

    #[test]
    fn test_single_slide_does_not_rotate() {
        let now = Instant::now();
        let mut engine = SlideRotationEngine::default();
        engine.init(&[item(1, "Only")], now);

        assert!(!engine.is_running());
        assert!(!engine.tick(now + Duration::from_secs(60)));
        assert_eq!(engine.current_index(), 0);
    }

    #[test]
    fn test_next_and_previous_wrap() {
        let now = Instant::now();
        let mut engine = SlideRotationEngine::default();
        engine.init(&[item(1, "A"), item(2, "B"), item(3, "C")], now);

        engine.previous();
        assert_eq!(engine.current_index(), 2);
        engine.next();
        assert_eq!(engine.current_index(), 0);

        for _ in 0..7 {
            engine.next();
        }
        assert_eq!(engine.current_index(), 7 % 3);
    }

    #[test]
    fn test_tick_advances_on_interval() {
        let t0 = Instant::now();
        let mut engine = SlideRotationEngine::new(Duration::from_secs(5));
        engine.init(&[item(1, "A"), item(2, "B")], t0);

        assert!(!engine.tick(t0 + Duration::from_secs(4)));
        assert_eq!(engine.current_index(), 0);

        assert!(engine.tick(t0 + Duration::from_secs(5)));
        assert_eq!(engine.current_index(), 1);

        // Next deadline is measured from the advance
        assert!(!engine.tick(t0 + Duration::from_secs(9)));
        assert!(engine.tick(t0 + Duration::from_secs(10)));
        assert_eq!(engine.current_index(), 0);
    }

    #[test]
    fn test_manual_navigation_resets_interval() {
        let t0 = Instant::now();
        let mut engine = SlideRotationEngine::new(Duration::from_secs(5));
        engine.init(&[item(1, "A"), item(2, "B"), item(3, "C")], t0);

        let t3 = t0 + Duration::from_secs(3);
        engine.next();
        engine.reset_timer(t3);

        assert!(!engine.tick(t0 + Duration::from_secs(6)));
        assert_eq!(engine.time_until_next(t3), Some(Duration::from_secs(5)));
        assert!(engine.tick(t3 + Duration::from_secs(5)));
        assert_eq!(engine.current_index(), 2);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let t0 = Instant::now();
        let mut engine = SlideRotationEngine::default();
        engine.init(&[item(1, "A"), item(2, "B")], t0);

        engine.stop();
        engine.stop();
        assert!(!engine.is_running());
        assert!(!engine.tick(t0 + Duration::from_secs(600)));
    }

    #[test]
    fn test_set_duration() {
        let t0 = Instant::now();
        let mut engine = SlideRotationEngine::default();
        engine.set_duration(12);
        engine.init(&[item(1, "A"), item(2, "B")], t0);

        assert!(!engine.tick(t0 + Duration::from_secs(11)));
        assert!(engine.tick(t0 + Duration::from_secs(12)));

        engine.set_duration(0);
        assert_eq!(engine.duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_reinit_to_empty() {
        let t0 = Instant::now();
        let mut engine = SlideRotationEngine::default();
        engine.init(&[item(1, "A"), item(2, "B")], t0);
        engine.next();

        engine.init(&[], t0);
        assert!(engine.is_empty());
        assert!(engine.current_slide().is_none());
        assert!(!engine.is_running());
    }

    #[test]
    fn test_counter_excludes_covers() {
        let t0 = Instant::now();
        let recorder = Recorder::default();
        let mut engine = SlideRotationEngine::default();
        engine.set_renderer(Box::new(recorder.clone()));

        engine.init(&[cover(1, "Lab"), item(2, "A"), item(3, "B")], t0);
        engine.next();
        engine.next();
        engine.next();

        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec!["Lab 0 / 2", "A 1 / 2", "B 2 / 2", "Lab 0 / 2"]
        );
    }

    #[test]
    fn test_list_layout_pages_items() {
        let t0 = Instant::now();
        let mut engine = SlideRotationEngine::default();
        engine.set_layout(SlideLayout::List { page_size: 2 });

        let records = vec![
            cover(1, "Lab"),
            item(2, "A"),
            item(3, "B"),
            item(4, "C"),
            cover(5, "Bay"),
        ];
        engine.init(&records, t0);

        assert_eq!(
            titles(&engine),
            vec!["Lab", "Bay", "Equipment (1/2)", "Equipment (2/2)"]
        );
        match &engine.slides()[3] {
            Slide::ListPage { records, .. } => assert_eq!(records[0].title(), "C"),
            other => panic!("unexpected slide {:?}", other),
        }
    }

    #[test]
    fn test_item_text_projection() {
        let mut record = item(1, "Rig 7");
        record.purpose = Some("  ".to_string());
        record.start_date = NaiveDate::from_ymd_opt(2024, 5, 1);
        record.end_date = NaiveDate::from_ymd_opt(2024, 6, 30);

        let text = SlideText::from(&Slide::Item(record));
        assert_eq!(text.title, "Rig 7");
        assert_eq!(text.rows[1], ("Model".to_string(), "-".to_string()));
        assert_eq!(text.rows[2].1, "-");
        assert_eq!(text.rows[3].1, "24/05/01 ~ 24/06/30");
    }

    #[test]
    fn test_schedule_formatting() {
        assert_eq!(format_schedule(None, None), "-");
        assert_eq!(
            format_schedule(NaiveDate::from_ymd_opt(2023, 12, 19), None),
            "23/12/19 ~ "
        );
    }

    #[test]
    fn test_cover_text_skips_blank_lines() {
        let mut record = cover(1, "Bench");
        record.function = vec!["Drop".to_string(), String::new(), String::new()];
        record.specifications = vec!["1 m".to_string(), "2 m".to_string()];

        let text = SlideText::from(&Slide::Cover(record));
        assert_eq!(text.rows.len(), 3);
        assert_eq!(text.rows[0], ("Function".to_string(), "Drop".to_string()));
    }
}
