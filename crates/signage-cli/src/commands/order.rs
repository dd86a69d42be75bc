//! Display order command handler

use anyhow::{bail, Context, Result};

use signage_core::storage::KvBackend;
use signage_core::{ContentStore, OrderEditor};

use crate::output::Output;

/// Reorder slides
///
/// Takes either a full sequence, top of the list first the way `list`
/// prints it, or a single step up or down for one slide. With neither it
/// prints the current sequence.
pub fn reorder<B: KvBackend>(
    store: &mut ContentStore<B>,
    sequence: Vec<u32>,
    up: Option<u32>,
    down: Option<u32>,
    output: &Output,
) -> Result<()> {
    let mut editor = OrderEditor::open(store);
    if editor.is_empty() {
        bail!("No slides to reorder");
    }

    let moved = match (up, down) {
        (Some(order), _) => step(&mut editor, order, OrderEditor::move_up)?,
        (_, Some(order)) => step(&mut editor, order, OrderEditor::move_down)?,
        (None, None) if sequence.is_empty() => {
            output.message(&format_sequence(editor.sequence()));
            return Ok(());
        }
        (None, None) => {
            store
                .reorder(&sequence)
                .context("Failed to apply display order")?;
            output.success(&format!(
                "Display order: {}",
                format_sequence(OrderEditor::open(store).sequence())
            ));
            return Ok(());
        }
    };

    if !moved {
        output.message("Already at the edge; nothing to move");
        return Ok(());
    }

    editor.commit(store).context("Failed to apply display order")?;
    output.success(&format!(
        "Display order: {}",
        format_sequence(editor.sequence())
    ));
    Ok(())
}

fn step(
    editor: &mut OrderEditor,
    order: u32,
    mv: fn(&mut OrderEditor) -> bool,
) -> Result<bool> {
    editor.select(Some(order));
    if editor.selected().is_none() {
        bail!("Slide not found: {}", order);
    }
    Ok(mv(editor))
}

fn format_sequence(sequence: &[u32]) -> String {
    sequence
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use signage_core::storage::MemoryBackend;
    use signage_core::ContentRecord;

    fn store_with(titles: &[&str]) -> ContentStore<MemoryBackend> {
        let mut store = ContentStore::in_memory();
        for title in titles {
            store.add_record(ContentRecord::item(*title)).unwrap();
        }
        store
    }

    fn quiet() -> Output {
        Output::new(OutputFormat::Quiet)
    }

    fn titles_top_down(store: &ContentStore<MemoryBackend>) -> Vec<String> {
        store
            .records_descending()
            .iter()
            .map(|r| r.title().to_string())
            .collect()
    }

    #[test]
    fn test_format_sequence() {
        assert_eq!(format_sequence(&[3, 2, 1]), "3 2 1");
        assert_eq!(format_sequence(&[]), "");
    }

    #[test]
    fn test_move_up() {
        let mut store = store_with(&["A", "B", "C"]);

        // Listing is C B A; moving A (order 1) up puts it above B
        reorder(&mut store, vec![], Some(1), None, &quiet()).unwrap();
        assert_eq!(titles_top_down(&store), vec!["C", "A", "B"]);
    }

    #[test]
    fn test_move_past_edge_is_noop() {
        let mut store = store_with(&["A", "B"]);
        reorder(&mut store, vec![], Some(2), None, &quiet()).unwrap();
        assert_eq!(titles_top_down(&store), vec!["B", "A"]);
    }

    #[test]
    fn test_full_sequence() {
        let mut store = store_with(&["A", "B", "C"]);
        reorder(&mut store, vec![1, 2, 3], None, None, &quiet()).unwrap();
        assert_eq!(titles_top_down(&store), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_invalid_sequence_fails() {
        let mut store = store_with(&["A", "B", "C"]);
        assert!(reorder(&mut store, vec![1, 1, 2], None, None, &quiet()).is_err());
        assert!(reorder(&mut store, vec![1, 2], None, None, &quiet()).is_err());
        assert!(reorder(&mut store, vec![], None, Some(9), &quiet()).is_err());
        assert_eq!(titles_top_down(&store), vec!["C", "B", "A"]);
    }

    #[test]
    fn test_empty_store_fails() {
        let mut store = ContentStore::in_memory();
        assert!(reorder(&mut store, vec![], None, None, &quiet()).is_err());
    }
}
