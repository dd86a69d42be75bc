//! Display-order editing
//!
//! Works on the most-recent-first listing: row 1 is the record with the
//! highest order. Moves only touch the working sequence; nothing is saved
//! until [`OrderEditor::commit`].

use tracing::debug;

use crate::storage::{KvBackend, StorageResult};
use crate::store::ContentStore;

/// A row in the order editor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderRow {
    /// Number shown next to the row (`count - index`)
    pub display_number: usize,
    /// Stored order of the record on this row
    pub order: u32,
}

/// Working copy of the display sequence
#[derive(Debug, Clone, Default)]
pub struct OrderEditor {
    working: Vec<u32>,
    initial: Vec<u32>,
    selected: Option<u32>,
}

impl OrderEditor {
    /// Load the current sequence, most recent first
    pub fn open<B: KvBackend>(store: &ContentStore<B>) -> Self {
        let sequence: Vec<u32> = store.records_descending().iter().map(|r| r.order).collect();
        Self {
            working: sequence.clone(),
            initial: sequence,
            selected: None,
        }
    }

    pub fn len(&self) -> usize {
        self.working.len()
    }

    pub fn is_empty(&self) -> bool {
        self.working.is_empty()
    }

    /// Working sequence, top to bottom
    pub fn sequence(&self) -> &[u32] {
        &self.working
    }

    /// Select a row by order; selecting an unknown order clears the selection
    pub fn select(&mut self, order: Option<u32>) {
        self.selected = order.filter(|o| self.working.contains(o));
    }

    pub fn selected(&self) -> Option<u32> {
        self.selected
    }

    fn selected_index(&self) -> Option<usize> {
        let order = self.selected?;
        self.working.iter().position(|&o| o == order)
    }

    pub fn can_move_up(&self) -> bool {
        matches!(self.selected_index(), Some(i) if i > 0)
    }

    pub fn can_move_down(&self) -> bool {
        matches!(self.selected_index(), Some(i) if i + 1 < self.working.len())
    }

    /// Swap the selected row with the one above; returns whether it moved
    pub fn move_up(&mut self) -> bool {
        match self.selected_index() {
            Some(i) if i > 0 => {
                self.working.swap(i, i - 1);
                true
            }
            _ => false,
        }
    }

    /// Swap the selected row with the one below; returns whether it moved
    pub fn move_down(&mut self) -> bool {
        match self.selected_index() {
            Some(i) if i + 1 < self.working.len() => {
                self.working.swap(i, i + 1);
                true
            }
            _ => false,
        }
    }

    pub fn rows(&self) -> Vec<OrderRow> {
        let count = self.working.len();
        self.working
            .iter()
            .enumerate()
            .map(|(index, &order)| OrderRow {
                display_number: count - index,
                order,
            })
            .collect()
    }

    pub fn has_changes(&self) -> bool {
        self.working != self.initial
    }

    /// Drop unsaved moves
    pub fn revert(&mut self) {
        self.working = self.initial.clone();
    }

    /// Persist the working sequence
    ///
    /// Afterwards the editor reflects the stored state again, with the
    /// selection following the moved record.
    pub fn commit<B: KvBackend>(&mut self, store: &mut ContentStore<B>) -> StorageResult<()> {
        let selected_pos = self.selected_index();
        store.reorder(&self.working)?;
        debug!(count = self.working.len(), "order committed");

        let reopened = Self::open(store);
        self.selected = selected_pos.and_then(|i| reopened.working.get(i).copied());
        self.working = reopened.working;
        self.initial = reopened.initial;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentRecord;
    use crate::storage::MemoryBackend;

    fn store_with(names: &[&str]) -> ContentStore<MemoryBackend> {
        let mut store = ContentStore::in_memory();
        for name in names {
            store.add_record(ContentRecord::item(*name)).unwrap();
        }
        store
    }

    fn top_down(store: &ContentStore<MemoryBackend>) -> Vec<String> {
        store
            .records_descending()
            .iter()
            .map(|r| r.title().to_string())
            .collect()
    }

    #[test]
    fn test_open_lists_most_recent_first() {
        let store = store_with(&["A", "B", "C"]);
        let editor = OrderEditor::open(&store);

        assert_eq!(editor.sequence(), &[3, 2, 1]);
        assert_eq!(
            editor.rows(),
            vec![
                OrderRow {
                    display_number: 3,
                    order: 3
                },
                OrderRow {
                    display_number: 2,
                    order: 2
                },
                OrderRow {
                    display_number: 1,
                    order: 1
                },
            ]
        );
        assert!(!editor.has_changes());
    }

    #[test]
    fn test_boundaries() {
        let store = store_with(&["A", "B", "C"]);
        let mut editor = OrderEditor::open(&store);

        assert!(!editor.can_move_up());
        assert!(!editor.can_move_down());

        editor.select(Some(3));
        assert!(!editor.can_move_up());
        assert!(editor.can_move_down());
        assert!(!editor.move_up());

        editor.select(Some(1));
        assert!(editor.can_move_up());
        assert!(!editor.can_move_down());
        assert!(!editor.move_down());
        assert!(!editor.has_changes());
    }

    #[test]
    fn test_select_is_single() {
        let store = store_with(&["A", "B"]);
        let mut editor = OrderEditor::open(&store);

        editor.select(Some(1));
        editor.select(Some(2));
        assert_eq!(editor.selected(), Some(2));
        editor.select(Some(99));
        assert_eq!(editor.selected(), None);
    }

    #[test]
    fn test_move_and_revert() {
        let store = store_with(&["A", "B", "C"]);
        let mut editor = OrderEditor::open(&store);

        editor.select(Some(1));
        assert!(editor.move_up());
        assert_eq!(editor.sequence(), &[3, 1, 2]);
        assert!(editor.has_changes());

        // Moving back restores the initial sequence
        assert!(editor.move_down());
        assert!(!editor.has_changes());

        editor.move_up();
        editor.revert();
        assert_eq!(editor.sequence(), &[3, 2, 1]);
    }

    #[test]
    fn test_commit_persists_and_resets_baseline() {
        let mut store = store_with(&["A", "B", "C"]);
        let mut editor = OrderEditor::open(&store);

        editor.select(Some(1));
        editor.move_up();
        editor.move_up();
        editor.commit(&mut store).unwrap();

        assert_eq!(top_down(&store), vec!["A", "C", "B"]);
        assert!(!editor.has_changes());
        assert_eq!(editor.sequence(), &[3, 2, 1]);
        // Selection follows the moved record to its new order
        assert_eq!(editor.selected(), Some(3));
        assert!(!editor.can_move_up());
    }

    #[test]
    fn test_commit_without_moves_is_stable() {
        let mut store = store_with(&["A", "B", "C"]);
        let before = store.load();

        let mut editor = OrderEditor::open(&store);
        editor.commit(&mut store).unwrap();
        assert_eq!(store.load(), before);
    }

    #[test]
    fn test_empty_editor() {
        let store = ContentStore::in_memory();
        let mut editor = OrderEditor::open(&store);
        assert!(editor.is_empty());
        editor.select(Some(1));
        assert!(!editor.move_up());
        assert!(editor.rows().is_empty());
    }
}
