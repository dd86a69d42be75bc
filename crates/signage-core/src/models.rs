//! Data models for the kiosk
//!
//! Defines the persisted structures: content records (covers and items),
//! partial record updates, timer settings, the legacy singleton cover and
//! the top-level view mode.
//!
//! All of them serialize to the camelCase JSON layout the kiosk has always
//! stored, so existing `slideData` / `timerSettings` documents keep loading.

use std::fmt;
use std::ops::RangeInclusive;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Maximum number of Cover records
pub const MAX_COVERS: usize = 5;
/// Maximum number of Item records
pub const MAX_ITEMS: usize = 10;
/// Number of function / specification lines on a cover
pub const COVER_LINES: usize = 3;

/// Inclusive range accepted for every timer value, in seconds
pub const TIMER_RANGE: RangeInclusive<u32> = 1..=99;

/// Classification of a content record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Cover,
    /// Untyped legacy records are items
    #[default]
    Item,
}

impl RecordKind {
    /// Maximum number of records of this kind
    pub fn cap(self) -> usize {
        match self {
            RecordKind::Cover => MAX_COVERS,
            RecordKind::Item => MAX_ITEMS,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Cover => write!(f, "Cover"),
            RecordKind::Item => write!(f, "Item"),
        }
    }
}

/// One displayable unit: a cover or an equipment item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRecord {
    /// Display position, contiguous from 1 across the whole collection
    pub order: u32,
    #[serde(rename = "type", default)]
    pub kind: RecordKind,

    // Cover fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tester_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub function: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub specifications: Vec<String>,

    // Item fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_machine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, with = "optional_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, with = "optional_date")]
    pub end_date: Option<NaiveDate>,

    /// Storage-relative path of the attached image
    #[serde(default)]
    pub image_path: Option<String>,
    /// File name the image had when it was picked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_image_name: Option<String>,
}

impl ContentRecord {
    fn empty(kind: RecordKind) -> Self {
        Self {
            order: 0,
            kind,
            tester_name: None,
            function: Vec::new(),
            specifications: Vec::new(),
            test_machine: None,
            model: None,
            purpose: None,
            start_date: None,
            end_date: None,
            image_path: None,
            original_image_name: None,
        }
    }

    /// A new item record; the order is assigned when it is added to the store
    pub fn item(test_machine: impl Into<String>) -> Self {
        Self {
            test_machine: Some(test_machine.into()),
            ..Self::empty(RecordKind::Item)
        }
    }

    /// A new cover record; the order is assigned when it is added to the store
    pub fn cover(tester_name: impl Into<String>) -> Self {
        Self {
            tester_name: Some(tester_name.into()),
            ..Self::empty(RecordKind::Cover)
        }
    }

    /// Name shown in listings and confirmation prompts
    pub fn title(&self) -> &str {
        let name = match self.kind {
            RecordKind::Cover => self.tester_name.as_deref(),
            RecordKind::Item => self.test_machine.as_deref(),
        };
        match name {
            Some(name) if !name.is_empty() => name,
            _ => "-",
        }
    }

    pub fn is_cover(&self) -> bool {
        self.kind == RecordKind::Cover
    }

    pub fn is_item(&self) -> bool {
        self.kind == RecordKind::Item
    }

    /// Shallow merge of a patch over this record
    pub fn apply(&mut self, patch: &RecordPatch) {
        if let Some(ref v) = patch.tester_name {
            self.tester_name = Some(v.clone());
        }
        if let Some(ref v) = patch.function {
            self.function = v.clone();
        }
        if let Some(ref v) = patch.specifications {
            self.specifications = v.clone();
        }
        if let Some(ref v) = patch.test_machine {
            self.test_machine = Some(v.clone());
        }
        if let Some(ref v) = patch.model {
            self.model = Some(v.clone());
        }
        if let Some(ref v) = patch.purpose {
            self.purpose = Some(v.clone());
        }
        if let Some(v) = patch.start_date {
            self.start_date = v;
        }
        if let Some(v) = patch.end_date {
            self.end_date = v;
        }
        if let Some(ref v) = patch.image_path {
            self.image_path = v.clone();
        }
        if let Some(ref v) = patch.original_image_name {
            self.original_image_name = v.clone();
        }
    }
}

/// Partial update of a content record
///
/// `None` leaves a field unchanged. For clearable fields the inner option
/// distinguishes "set" from "clear".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPatch {
    pub tester_name: Option<String>,
    pub function: Option<Vec<String>>,
    pub specifications: Option<Vec<String>>,
    pub test_machine: Option<String>,
    pub model: Option<String>,
    pub purpose: Option<String>,
    pub start_date: Option<Option<NaiveDate>>,
    pub end_date: Option<Option<NaiveDate>>,
    pub image_path: Option<Option<String>>,
    pub original_image_name: Option<Option<String>>,
}

impl RecordPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Which of the three timers a value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Slide rotation interval
    Slider,
    /// Idle timeout on the settings listing
    Home,
    /// Idle timeout on sub-editing screens
    Back,
}

impl TimerKind {
    pub fn key(self) -> &'static str {
        match self {
            TimerKind::Slider => "sliderTimer",
            TimerKind::Home => "homeTimer",
            TimerKind::Back => "backTimer",
        }
    }
}

/// Rotation and idle timer durations, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSettings {
    pub slider_timer: u32,
    pub home_timer: u32,
    pub back_timer: u32,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            slider_timer: 5,
            home_timer: 90,
            back_timer: 90,
        }
    }
}

impl TimerSettings {
    /// Defaults with every stored value laid over them
    pub fn merged(stored: &TimerSettingsPatch) -> Self {
        let mut settings = Self::default();
        settings.apply(stored);
        settings
    }

    pub fn apply(&mut self, patch: &TimerSettingsPatch) {
        if let Some(v) = patch.slider_timer {
            self.slider_timer = v;
        }
        if let Some(v) = patch.home_timer {
            self.home_timer = v;
        }
        if let Some(v) = patch.back_timer {
            self.back_timer = v;
        }
    }

    pub fn get(&self, kind: TimerKind) -> u32 {
        match kind {
            TimerKind::Slider => self.slider_timer,
            TimerKind::Home => self.home_timer,
            TimerKind::Back => self.back_timer,
        }
    }

    pub fn slide_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.slider_timer))
    }

    pub fn to_patch(self) -> TimerSettingsPatch {
        TimerSettingsPatch {
            slider_timer: Some(self.slider_timer),
            home_timer: Some(self.home_timer),
            back_timer: Some(self.back_timer),
        }
    }
}

/// Stored (possibly partial) timer settings
///
/// Values are written as numeric strings; plain numbers are accepted on read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none", with = "seconds_text")]
    pub slider_timer: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "seconds_text")]
    pub home_timer: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "seconds_text")]
    pub back_timer: Option<u32>,
}

impl TimerSettingsPatch {
    /// Lay `other` over `self`
    pub fn merge(&mut self, other: &TimerSettingsPatch) {
        if other.slider_timer.is_some() {
            self.slider_timer = other.slider_timer;
        }
        if other.home_timer.is_some() {
            self.home_timer = other.home_timer;
        }
        if other.back_timer.is_some() {
            self.back_timer = other.back_timer;
        }
    }
}

/// Legacy singleton cover, stored without order or type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverData {
    pub tester_name: String,
    pub function: Vec<String>,
    pub specifications: Vec<String>,
    pub image_path: Option<String>,
}

impl Default for CoverData {
    fn default() -> Self {
        Self {
            tester_name: "(Tester Name)".to_string(),
            function: vec!["(Function #1)".to_string(), String::new(), String::new()],
            specifications: vec![
                "(Specifications #1)".to_string(),
                String::new(),
                String::new(),
            ],
            image_path: None,
        }
    }
}

/// Stored cover fields, any of which may be missing
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCoverData {
    #[serde(default)]
    pub tester_name: Option<String>,
    #[serde(default)]
    pub function: Option<Vec<String>>,
    #[serde(default)]
    pub specifications: Option<Vec<String>>,
    #[serde(default)]
    pub image_path: Option<String>,
}

impl CoverData {
    /// Defaults with stored values laid over them
    ///
    /// Line arrays keep the stored lines and are padded with the default tail.
    pub fn merged(stored: StoredCoverData) -> Self {
        let defaults = Self::default();
        Self {
            tester_name: stored.tester_name.unwrap_or(defaults.tester_name),
            function: pad_lines(stored.function.unwrap_or_default(), &defaults.function),
            specifications: pad_lines(
                stored.specifications.unwrap_or_default(),
                &defaults.specifications,
            ),
            image_path: stored.image_path,
        }
    }

    /// Convert into a Cover record for the unified collection
    pub fn into_record(self) -> ContentRecord {
        let mut record = ContentRecord::cover(self.tester_name);
        record.function = self.function;
        record.specifications = self.specifications;
        record.image_path = self.image_path;
        record
    }
}

fn pad_lines(mut saved: Vec<String>, defaults: &[String]) -> Vec<String> {
    if saved.len() < defaults.len() {
        saved.extend_from_slice(&defaults[saved.len()..]);
    }
    saved
}

/// Top-level public view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// One slide per record
    #[default]
    Slide,
    /// Covers followed by paginated item lists
    List,
}

impl ViewMode {
    pub fn toggled(self) -> Self {
        match self {
            ViewMode::Slide => ViewMode::List,
            ViewMode::List => ViewMode::Slide,
        }
    }
}

/// ISO dates where an empty string also means "no date"
mod optional_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S>(value: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(date) => serializer.serialize_str(&date.format(FORMAT).to_string()),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => NaiveDate::parse_from_str(text, FORMAT)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

/// Seconds stored as numeric strings
mod seconds_text {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    pub fn serialize<S>(value: &Option<u32>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(secs) => serializer.serialize_str(&secs.to_string()),
            None => serializer.serialize_none(),
        }
    }

    /// Unparsable values read as absent so the default applies
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<Raw> = Option::deserialize(deserializer)?;
        Ok(match raw {
            Some(Raw::Number(n)) => u32::try_from(n).ok(),
            Some(Raw::Text(text)) => text.trim().parse::<u32>().ok(),
            None => None,
        }
        .filter(|secs| *secs > 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_item_serializes_camel_case() {
        let mut record = ContentRecord::item("M1");
        record.order = 3;
        record.model = Some("X-200".to_string());
        record.start_date = Some(date(2024, 5, 1));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["order"], 3);
        assert_eq!(json["type"], "Item");
        assert_eq!(json["testMachine"], "M1");
        assert_eq!(json["model"], "X-200");
        assert_eq!(json["startDate"], "2024-05-01");
        assert_eq!(json["endDate"], "");
        assert!(json.get("testerName").is_none());
    }

    #[test]
    fn test_legacy_record_without_type_is_item() {
        let json = r#"{"order":1,"testMachine":"Old rig","startDate":"","endDate":"2023-12-19","imagePath":null}"#;
        let record: ContentRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.kind, RecordKind::Item);
        assert_eq!(record.title(), "Old rig");
        assert!(record.start_date.is_none());
        assert_eq!(record.end_date, Some(date(2023, 12, 19)));
    }

    #[test]
    fn test_cover_round_trip_keeps_lines() {
        let mut record = ContentRecord::cover("Lab A");
        record.function = vec!["Fatigue".to_string(), "Tensile".to_string()];
        let text = serde_json::to_string(&record).unwrap();
        let back: ContentRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(back, record);
        assert!(back.is_cover());
    }

    #[test]
    fn test_title_falls_back_to_dash() {
        let mut record = ContentRecord::item("");
        assert_eq!(record.title(), "-");
        record.test_machine = None;
        assert_eq!(record.title(), "-");
    }

    #[test]
    fn test_apply_patch_preserves_unspecified_fields() {
        let mut record = ContentRecord::item("M1");
        record.model = Some("A".to_string());
        record.image_path = Some("20240101120000.png".to_string());

        let patch = RecordPatch {
            purpose: Some("Endurance".to_string()),
            end_date: Some(Some(date(2024, 2, 1))),
            ..RecordPatch::default()
        };
        record.apply(&patch);

        assert_eq!(record.model.as_deref(), Some("A"));
        assert_eq!(record.purpose.as_deref(), Some("Endurance"));
        assert_eq!(record.end_date, Some(date(2024, 2, 1)));
        assert_eq!(record.image_path.as_deref(), Some("20240101120000.png"));
    }

    #[test]
    fn test_apply_patch_clears_image() {
        let mut record = ContentRecord::item("M1");
        record.image_path = Some("a.png".to_string());
        record.original_image_name = Some("photo.png".to_string());

        record.apply(&RecordPatch {
            image_path: Some(None),
            original_image_name: Some(None),
            ..RecordPatch::default()
        });

        assert!(record.image_path.is_none());
        assert!(record.original_image_name.is_none());
    }

    #[test]
    fn test_timer_patch_reads_strings_and_numbers() {
        let patch: TimerSettingsPatch =
            serde_json::from_str(r#"{"sliderTimer":"7","homeTimer":30}"#).unwrap();
        assert_eq!(patch.slider_timer, Some(7));
        assert_eq!(patch.home_timer, Some(30));
        assert_eq!(patch.back_timer, None);

        let settings = TimerSettings::merged(&patch);
        assert_eq!(settings.slider_timer, 7);
        assert_eq!(settings.home_timer, 30);
        assert_eq!(settings.back_timer, 90);
    }

    #[test]
    fn test_timer_patch_writes_strings() {
        let text = serde_json::to_string(&TimerSettings::default().to_patch()).unwrap();
        assert_eq!(
            text,
            r#"{"sliderTimer":"5","homeTimer":"90","backTimer":"90"}"#
        );
    }

    #[test]
    fn test_timer_patch_ignores_garbage() {
        let patch: TimerSettingsPatch =
            serde_json::from_str(r#"{"sliderTimer":"abc","backTimer":"0"}"#).unwrap();
        assert_eq!(patch, TimerSettingsPatch::default());
    }

    #[test]
    fn test_cover_data_pads_lines() {
        let stored: StoredCoverData =
            serde_json::from_str(r#"{"testerName":"Bench 4","function":["Drop test"]}"#).unwrap();
        let cover = CoverData::merged(stored);

        assert_eq!(cover.tester_name, "Bench 4");
        assert_eq!(cover.function, vec!["Drop test", "", ""]);
        assert_eq!(
            cover.specifications,
            vec!["(Specifications #1)".to_string(), String::new(), String::new()]
        );
    }

    #[test]
    fn test_kind_caps() {
        assert_eq!(RecordKind::Cover.cap(), 5);
        assert_eq!(RecordKind::Item.cap(), 10);
    }

    #[test]
    fn test_view_mode_serialization() {
        assert_eq!(serde_json::to_string(&ViewMode::List).unwrap(), "\"list\"");
        assert_eq!(ViewMode::Slide.toggled(), ViewMode::List);
    }
}
