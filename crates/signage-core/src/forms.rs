//! Editing forms
//!
//! Drafts hold what the operator typed; validation trims and checks them
//! before anything is written. A [`RecordForm`] ties one draft to its image
//! attachment and performs the save in a fixed sequence:
//!
//! 1. validate the draft
//! 2. check the per-type cap (new records only)
//! 3. write the staged image
//! 4. add or update the record, removing the new image again if that fails

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, warn};

use crate::images::{delete_best_effort, ImageAttachment, ImageError, ImagePolicy, ImageStorage};
use crate::models::{
    ContentRecord, RecordKind, RecordPatch, TimerKind, TimerSettings, TimerSettingsPatch,
    COVER_LINES, TIMER_RANGE,
};
use crate::storage::{KvBackend, StorageError, StorageResult};
use crate::store::ContentStore;

/// Longest accepted item field, in characters
pub const MAX_FIELD_CHARS: usize = 40;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Errors raised while validating or submitting a form
#[derive(Error, Debug)]
pub enum FormError {
    #[error("{field} is required")]
    Required { field: &'static str },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("{field} has more than {max} lines")]
    TooManyLines { field: &'static str, max: usize },

    #[error("Invalid date '{value}', expected YYYY-MM-DD")]
    InvalidDate { value: String },

    #[error("End date {end} is before start date {start}")]
    DateOrder { start: NaiveDate, end: NaiveDate },

    #[error("Every timer value must be a number from 1 to 99 ({} is not)", .kind.key())]
    TimerRange { kind: TimerKind },

    #[error("A save is already in progress")]
    AlreadySubmitting,

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Parse a `YYYY-MM-DD` date; blank means no date
pub fn parse_date(value: &str) -> Result<Option<NaiveDate>, FormError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map(Some)
        .map_err(|_| FormError::InvalidDate {
            value: value.to_string(),
        })
}

fn check_length(field: &'static str, value: &str) -> Result<(), FormError> {
    if value.chars().count() > MAX_FIELD_CHARS {
        return Err(FormError::TooLong {
            field,
            max: MAX_FIELD_CHARS,
        });
    }
    Ok(())
}

fn blank_to_none(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Item fields as typed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemDraft {
    pub test_machine: String,
    pub model: String,
    pub purpose: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl ItemDraft {
    pub fn from_record(record: &ContentRecord) -> Self {
        Self {
            test_machine: record.test_machine.clone().unwrap_or_default(),
            model: record.model.clone().unwrap_or_default(),
            purpose: record.purpose.clone().unwrap_or_default(),
            start_date: record.start_date,
            end_date: record.end_date,
        }
    }

    /// Trimmed copy, if every rule holds
    pub fn validate(&self) -> Result<Self, FormError> {
        let draft = Self {
            test_machine: self.test_machine.trim().to_string(),
            model: self.model.trim().to_string(),
            purpose: self.purpose.trim().to_string(),
            start_date: self.start_date,
            end_date: self.end_date,
        };

        if draft.test_machine.is_empty() {
            return Err(FormError::Required {
                field: "Test machine",
            });
        }
        check_length("Test machine", &draft.test_machine)?;
        check_length("Model", &draft.model)?;
        check_length("Purpose", &draft.purpose)?;

        if let (Some(start), Some(end)) = (draft.start_date, draft.end_date) {
            if end < start {
                return Err(FormError::DateOrder { start, end });
            }
        }
        Ok(draft)
    }

    fn into_record(self) -> ContentRecord {
        let mut record = ContentRecord::item(self.test_machine);
        record.model = blank_to_none(self.model);
        record.purpose = blank_to_none(self.purpose);
        record.start_date = self.start_date;
        record.end_date = self.end_date;
        record
    }

    fn to_patch(&self) -> RecordPatch {
        RecordPatch {
            test_machine: Some(self.test_machine.clone()),
            model: Some(self.model.clone()),
            purpose: Some(self.purpose.clone()),
            start_date: Some(self.start_date),
            end_date: Some(self.end_date),
            ..RecordPatch::default()
        }
    }
}

/// Cover fields as typed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverDraft {
    pub tester_name: String,
    pub function: Vec<String>,
    pub specifications: Vec<String>,
}

impl CoverDraft {
    pub fn from_record(record: &ContentRecord) -> Self {
        Self {
            tester_name: record.tester_name.clone().unwrap_or_default(),
            function: record.function.clone(),
            specifications: record.specifications.clone(),
        }
    }

    /// Trimmed copy with both line lists padded to full length
    pub fn validate(&self) -> Result<Self, FormError> {
        let tester_name = self.tester_name.trim().to_string();
        if tester_name.is_empty() {
            return Err(FormError::Required {
                field: "Tester name",
            });
        }
        Ok(Self {
            tester_name,
            function: cover_lines("Function", &self.function)?,
            specifications: cover_lines("Specifications", &self.specifications)?,
        })
    }

    fn into_record(self) -> ContentRecord {
        let mut record = ContentRecord::cover(self.tester_name);
        record.function = self.function;
        record.specifications = self.specifications;
        record
    }

    fn to_patch(&self) -> RecordPatch {
        RecordPatch {
            tester_name: Some(self.tester_name.clone()),
            function: Some(self.function.clone()),
            specifications: Some(self.specifications.clone()),
            ..RecordPatch::default()
        }
    }
}

fn cover_lines(field: &'static str, lines: &[String]) -> Result<Vec<String>, FormError> {
    let mut trimmed: Vec<String> = lines.iter().map(|l| l.trim().to_string()).collect();
    while trimmed.len() > COVER_LINES && trimmed.last().is_some_and(String::is_empty) {
        trimmed.pop();
    }
    if trimmed.len() > COVER_LINES {
        return Err(FormError::TooManyLines {
            field,
            max: COVER_LINES,
        });
    }
    trimmed.resize(COVER_LINES, String::new());
    Ok(trimmed)
}

/// Either kind of draft
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Draft {
    Item(ItemDraft),
    Cover(CoverDraft),
}

impl Draft {
    pub fn kind(&self) -> RecordKind {
        match self {
            Draft::Item(_) => RecordKind::Item,
            Draft::Cover(_) => RecordKind::Cover,
        }
    }

    pub fn from_record(record: &ContentRecord) -> Self {
        match record.kind {
            RecordKind::Item => Draft::Item(ItemDraft::from_record(record)),
            RecordKind::Cover => Draft::Cover(CoverDraft::from_record(record)),
        }
    }

    pub fn validate(&self) -> Result<Self, FormError> {
        Ok(match self {
            Draft::Item(d) => Draft::Item(d.validate()?),
            Draft::Cover(d) => Draft::Cover(d.validate()?),
        })
    }

    fn into_record(self) -> ContentRecord {
        match self {
            Draft::Item(d) => d.into_record(),
            Draft::Cover(d) => d.into_record(),
        }
    }

    fn to_patch(&self) -> RecordPatch {
        match self {
            Draft::Item(d) => d.to_patch(),
            Draft::Cover(d) => d.to_patch(),
        }
    }
}

/// Whether a form creates a record or edits one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    New,
    Edit { order: u32 },
}

/// Edit session for one record and its image
#[derive(Debug)]
pub struct RecordForm {
    mode: FormMode,
    draft: Draft,
    initial: Draft,
    image: ImageAttachment,
    submitting: bool,
}

impl RecordForm {
    /// Blank form for a new record of `kind`
    pub fn new<S: ImageStorage + ?Sized>(
        kind: RecordKind,
        storage: &S,
        policy: ImagePolicy,
    ) -> Self {
        let draft = match kind {
            RecordKind::Item => Draft::Item(ItemDraft::default()),
            RecordKind::Cover => Draft::Cover(CoverDraft::default()),
        };
        Self {
            mode: FormMode::New,
            initial: draft.clone(),
            draft,
            image: ImageAttachment::open(storage, policy, None),
            submitting: false,
        }
    }

    /// Form prefilled from the record with `order`, `None` if there is none
    pub fn edit<B: KvBackend, S: ImageStorage + ?Sized>(
        store: &ContentStore<B>,
        storage: &S,
        policy: ImagePolicy,
        order: u32,
    ) -> Option<Self> {
        let record = store.get(order)?;
        let draft = Draft::from_record(&record);
        Some(Self {
            mode: FormMode::Edit { order },
            initial: draft.clone(),
            draft,
            image: ImageAttachment::open(storage, policy, record.image_path.as_deref()),
            submitting: false,
        })
    }

    pub fn mode(&self) -> FormMode {
        self.mode
    }

    pub fn kind(&self) -> RecordKind {
        self.draft.kind()
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut Draft {
        &mut self.draft
    }

    pub fn image(&self) -> &ImageAttachment {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut ImageAttachment {
        &mut self.image
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn has_changes(&self) -> bool {
        self.draft != self.initial || self.image.is_changed()
    }

    /// Leaving now would lose edits
    pub fn should_warn_on_leave(&self) -> bool {
        !self.submitting && self.has_changes()
    }

    /// Save the draft and its image
    ///
    /// Returns the order of the saved record, `None` when the edited record
    /// no longer exists. After a failure the form can be submitted again.
    pub fn submit<B: KvBackend, S: ImageStorage + ?Sized>(
        &mut self,
        store: &mut ContentStore<B>,
        storage: &mut S,
    ) -> Result<Option<u32>, FormError> {
        if self.submitting {
            return Err(FormError::AlreadySubmitting);
        }
        self.submitting = true;

        let result = self.try_submit(store, storage);
        match &result {
            Ok(_) => self.initial = self.draft.clone(),
            Err(e) => {
                debug!(error = %e, "submit failed");
                self.submitting = false;
            }
        }
        result
    }

    fn try_submit<B: KvBackend, S: ImageStorage + ?Sized>(
        &mut self,
        store: &mut ContentStore<B>,
        storage: &mut S,
    ) -> Result<Option<u32>, FormError> {
        let validated = self.draft.validate()?;
        let kind = validated.kind();

        if self.mode == FormMode::New && !store.can_add(kind) {
            return Err(StorageError::CapacityExceeded {
                kind,
                cap: kind.cap(),
            }
            .into());
        }

        let committed = self.image.commit(storage)?;

        let saved = match self.mode {
            FormMode::New => {
                let mut record = validated.clone().into_record();
                record.image_path = committed.path.clone();
                record.original_image_name = committed.original_name.clone();
                store.add_record(record).map(Some)
            }
            FormMode::Edit { order } => {
                let mut patch = validated.to_patch();
                patch.image_path = Some(committed.path.clone());
                if committed.is_new() {
                    patch.original_image_name = Some(committed.original_name.clone());
                } else if committed.path.is_none() {
                    patch.original_image_name = Some(None);
                }
                store
                    .update_record(order, &patch)
                    .map(|updated| updated.then_some(order))
            }
        };

        match saved {
            Ok(Some(order)) => {
                self.image.finish(storage, &committed);
                self.draft = validated;
                debug!(order, "record saved");
                Ok(Some(order))
            }
            Ok(None) => {
                self.image.discard(storage, &committed);
                Ok(None)
            }
            Err(e) => {
                self.image.discard(storage, &committed);
                Err(e.into())
            }
        }
    }
}

/// Delete a record and its image
///
/// The image goes best effort; a leftover file never blocks the delete.
pub fn delete_record<B: KvBackend, S: ImageStorage + ?Sized>(
    store: &mut ContentStore<B>,
    storage: &mut S,
    order: u32,
) -> StorageResult<Option<ContentRecord>> {
    let removed = store.delete_record(order)?;
    if let Some(path) = removed.as_ref().and_then(|r| r.image_path.as_deref()) {
        delete_best_effort(storage, path);
    }
    Ok(removed)
}

/// Keep only digits and drop leading zeros
pub fn sanitize_input(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    digits.trim_start_matches('0').to_string()
}

const TIMER_KINDS: [TimerKind; 3] = [TimerKind::Slider, TimerKind::Home, TimerKind::Back];

fn timer_index(kind: TimerKind) -> usize {
    match kind {
        TimerKind::Slider => 0,
        TimerKind::Home => 1,
        TimerKind::Back => 2,
    }
}

/// The three timer inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerForm {
    inputs: [String; 3],
    initial: [String; 3],
}

impl TimerForm {
    /// Form filled with the effective settings
    ///
    /// The effective values are written back so every timer is stored
    /// explicitly from here on.
    pub fn open<B: KvBackend>(store: &mut ContentStore<B>) -> StorageResult<Self> {
        let settings = store.load_timer_settings();
        store.save_timer_settings(&settings.to_patch())?;
        Ok(Self::from_settings(settings))
    }

    pub fn from_settings(settings: TimerSettings) -> Self {
        let inputs = TIMER_KINDS.map(|kind| settings.get(kind).to_string());
        Self {
            initial: inputs.clone(),
            inputs,
        }
    }

    pub fn input(&self, kind: TimerKind) -> &str {
        &self.inputs[timer_index(kind)]
    }

    /// Replace an input with the sanitized form of what was typed
    pub fn set_input(&mut self, kind: TimerKind, raw: &str) {
        self.inputs[timer_index(kind)] = sanitize_input(raw);
    }

    pub fn has_changes(&self) -> bool {
        self.inputs != self.initial
    }

    /// Parse all three inputs
    pub fn validate(&self) -> Result<TimerSettings, FormError> {
        let parse = |kind: TimerKind| -> Result<u32, FormError> {
            self.input(kind)
                .parse::<u32>()
                .ok()
                .filter(|secs| TIMER_RANGE.contains(secs))
                .ok_or(FormError::TimerRange { kind })
        };
        Ok(TimerSettings {
            slider_timer: parse(TimerKind::Slider)?,
            home_timer: parse(TimerKind::Home)?,
            back_timer: parse(TimerKind::Back)?,
        })
    }

    /// Store all three values; nothing is written if any is out of range
    pub fn submit<B: KvBackend>(
        &mut self,
        store: &mut ContentStore<B>,
    ) -> Result<TimerSettings, FormError> {
        let settings = self.validate()?;
        store.save_timer_settings(&settings.to_patch())?;
        self.initial = self.inputs.clone();
        debug!(?settings, "timer settings saved");
        Ok(settings)
    }
}

/// Validate and store a partial set of timer values
///
/// Used where only some values are given; each given value must be in range.
pub fn save_timer_values<B: KvBackend>(
    store: &mut ContentStore<B>,
    patch: &TimerSettingsPatch,
) -> Result<TimerSettings, FormError> {
    for (kind, value) in [
        (TimerKind::Slider, patch.slider_timer),
        (TimerKind::Home, patch.home_timer),
        (TimerKind::Back, patch.back_timer),
    ] {
        if let Some(secs) = value {
            if !TIMER_RANGE.contains(&secs) {
                warn!(key = kind.key(), secs, "timer value out of range");
                return Err(FormError::TimerRange { kind });
            }
        }
    }
    store.save_timer_settings(patch)?;
    Ok(store.load_timer_settings())
}
