//! Timer command handlers

use anyhow::{bail, Result};

use signage_core::forms::save_timer_values;
use signage_core::models::TimerSettingsPatch;
use signage_core::storage::KvBackend;
use signage_core::ContentStore;

use crate::output::Output;

/// Show effective timer values
pub fn show<B: KvBackend>(store: &ContentStore<B>, output: &Output) -> Result<()> {
    output.print_timers(&store.load_timer_settings());
    Ok(())
}

/// Set one or more timers; nothing is written if any value is out of range
pub fn set<B: KvBackend>(
    store: &mut ContentStore<B>,
    slider: Option<u32>,
    home: Option<u32>,
    back: Option<u32>,
    output: &Output,
) -> Result<()> {
    let patch = TimerSettingsPatch {
        slider_timer: slider,
        home_timer: home,
        back_timer: back,
    };
    if patch == TimerSettingsPatch::default() {
        bail!("Nothing to set. Use --slider, --home or --back.");
    }

    let settings = save_timer_values(store, &patch)?;
    if output.is_quiet() {
        return Ok(());
    }
    output.success("Timers updated");
    output.print_timers(&settings);
    Ok(())
}
