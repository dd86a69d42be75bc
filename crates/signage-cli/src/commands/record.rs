//! Item and cover command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use signage_core::forms::{parse_date, CoverDraft, Draft, ItemDraft};
use signage_core::images::ImageStorage;
use signage_core::{
    Config, ContentStore, FormError, FsImageStorage, ImageCandidate, ImagePolicy, RecordForm,
    RecordKind,
};

use crate::output::Output;
use crate::prompt::confirm;

/// Image flags shared by items and covers
#[derive(Args, Debug, Default)]
pub struct ImageArgs {
    /// Attach this image file
    #[arg(long, conflicts_with = "clear_image")]
    pub image: Option<PathBuf>,

    /// Remove the current image
    #[arg(long)]
    pub clear_image: bool,
}

/// Item fields; anything left out keeps its current value
#[derive(Args, Debug, Default)]
pub struct ItemFields {
    /// Test machine name
    #[arg(long)]
    pub machine: Option<String>,

    /// Model
    #[arg(long)]
    pub model: Option<String>,

    /// Purpose of the test
    #[arg(long)]
    pub purpose: Option<String>,

    /// Start date (YYYY-MM-DD, empty to clear)
    #[arg(long)]
    pub start: Option<String>,

    /// End date (YYYY-MM-DD, empty to clear)
    #[arg(long)]
    pub end: Option<String>,

    #[command(flatten)]
    pub image: ImageArgs,
}

impl ItemFields {
    fn apply(&self, draft: &mut ItemDraft) -> Result<(), FormError> {
        if let Some(machine) = &self.machine {
            draft.test_machine = machine.clone();
        }
        if let Some(model) = &self.model {
            draft.model = model.clone();
        }
        if let Some(purpose) = &self.purpose {
            draft.purpose = purpose.clone();
        }
        if let Some(start) = &self.start {
            draft.start_date = parse_date(start)?;
        }
        if let Some(end) = &self.end {
            draft.end_date = parse_date(end)?;
        }
        Ok(())
    }
}

/// Cover fields; repeated line flags replace all lines of that field
#[derive(Args, Debug, Default)]
pub struct CoverFields {
    /// Tester name
    #[arg(long)]
    pub tester: Option<String>,

    /// Function line (repeat for up to 3 lines)
    #[arg(long = "function")]
    pub function: Vec<String>,

    /// Specification line (repeat for up to 3 lines)
    #[arg(long = "spec")]
    pub specifications: Vec<String>,

    #[command(flatten)]
    pub image: ImageArgs,
}

impl CoverFields {
    fn apply(&self, draft: &mut CoverDraft) {
        if let Some(tester) = &self.tester {
            draft.tester_name = tester.clone();
        }
        if !self.function.is_empty() {
            draft.function = self.function.clone();
        }
        if !self.specifications.is_empty() {
            draft.specifications = self.specifications.clone();
        }
    }
}

/// Add a new item
pub fn add_item(
    store: &mut ContentStore,
    config: &Config,
    fields: ItemFields,
    output: &Output,
) -> Result<()> {
    let mut images = FsImageStorage::from_config(config);
    let mut form = RecordForm::new(RecordKind::Item, &images, ImagePolicy::from_config(config));
    if let Draft::Item(draft) = form.draft_mut() {
        fields.apply(draft)?;
    }
    submit(store, &mut images, form, &fields.image, output)
}

/// Edit an existing item
pub fn edit_item(
    store: &mut ContentStore,
    config: &Config,
    order: u32,
    fields: ItemFields,
    output: &Output,
) -> Result<()> {
    let mut images = FsImageStorage::from_config(config);
    let mut form = open_form(store, config, &images, order, RecordKind::Item)?;
    if let Draft::Item(draft) = form.draft_mut() {
        fields.apply(draft)?;
    }
    submit(store, &mut images, form, &fields.image, output)
}

/// Add a new cover page
pub fn add_cover(
    store: &mut ContentStore,
    config: &Config,
    fields: CoverFields,
    output: &Output,
) -> Result<()> {
    let mut images = FsImageStorage::from_config(config);
    let mut form = RecordForm::new(RecordKind::Cover, &images, ImagePolicy::from_config(config));
    if let Draft::Cover(draft) = form.draft_mut() {
        fields.apply(draft);
    }
    submit(store, &mut images, form, &fields.image, output)
}

/// Edit an existing cover page
pub fn edit_cover(
    store: &mut ContentStore,
    config: &Config,
    order: u32,
    fields: CoverFields,
    output: &Output,
) -> Result<()> {
    let mut images = FsImageStorage::from_config(config);
    let mut form = open_form(store, config, &images, order, RecordKind::Cover)?;
    if let Draft::Cover(draft) = form.draft_mut() {
        fields.apply(draft);
    }
    submit(store, &mut images, form, &fields.image, output)
}

fn open_form<S: ImageStorage>(
    store: &ContentStore,
    config: &Config,
    images: &S,
    order: u32,
    kind: RecordKind,
) -> Result<RecordForm> {
    let form = RecordForm::edit(store, images, ImagePolicy::from_config(config), order)
        .ok_or_else(|| anyhow::anyhow!("Slide not found: {}", order))?;
    if form.kind() != kind {
        bail!("Slide {} is a {}, not a {}", order, form.kind(), kind);
    }
    Ok(form)
}

fn submit<S: ImageStorage>(
    store: &mut ContentStore,
    images: &mut S,
    mut form: RecordForm,
    image: &ImageArgs,
    output: &Output,
) -> Result<()> {
    if let Some(path) = &image.image {
        let candidate = ImageCandidate::from_path(path, form.image().policy())?;
        form.image_mut().select(images, candidate)?;
    } else if image.clear_image {
        form.image_mut().clear(images);
    }

    let kind = form.kind();
    let editing = matches!(form.mode(), signage_core::forms::FormMode::Edit { .. });
    let Some(order) = form.submit(store, images)? else {
        bail!("Slide was removed while editing");
    };

    if editing {
        output.success(&format!("Updated {} #{}", kind, order));
    } else if output.is_quiet() {
        println!("{}", order);
    } else {
        output.success(&format!("Added {} #{}", kind, order));
    }
    Ok(())
}

/// List all slides, most recent first
pub fn list(store: &ContentStore, output: &Output) -> Result<()> {
    output.print_records(&store.records_descending());
    Ok(())
}

/// Show one slide
pub fn show(store: &ContentStore, order: u32, output: &Output) -> Result<()> {
    let record = store
        .get(order)
        .ok_or_else(|| anyhow::anyhow!("Slide not found: {}", order))?;
    output.print_record(&record);
    Ok(())
}

/// Delete a slide and its image
pub fn delete(
    store: &mut ContentStore,
    config: &Config,
    order: u32,
    yes: bool,
    output: &Output,
) -> Result<()> {
    let record = store
        .get(order)
        .ok_or_else(|| anyhow::anyhow!("Slide not found: {}", order))?;

    if !yes && output.should_prompt() {
        println!("Delete {}: {}", record.kind, record.title());
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let mut images = FsImageStorage::from_config(config);
    signage_core::forms::delete_record(store, &mut images, order)
        .context("Failed to delete slide")?;

    output.success(&format!("Deleted {} #{}", record.kind, order));
    Ok(())
}
